//! Integration tests for natcall using the natcall-testlib fixture cdylib.

use natcall::{
    ffi_call, platform_library_name, FfiError, NativeLibrary, NativeType, RecordField,
    RecordLayout, ScalarKind, Signature, Value,
};
use std::env;
use std::path::{Path, PathBuf};

/// Locate the fixture cdylib next to the test binary. Cargo puts test
/// binaries in `target/<profile>/deps`, the fixture in `target/<profile>`
/// (or in `deps` with a metadata hash when built as a dependency).
fn fixture_path() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let mut dir = exe.parent()?.to_path_buf();
    let file_name = platform_library_name("natcall_testlib");

    for _ in 0..3 {
        let candidate = dir.join(&file_name);
        if candidate.exists() {
            return Some(candidate);
        }
        if let Some(found) = scan_dir(&dir, &file_name) {
            return Some(found);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

fn scan_dir(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let (prefix, ext) = file_name.rsplit_once('.')?;
    let suffix = format!(".{ext}");
    for entry in std::fs::read_dir(dir).ok()?.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix) && name.ends_with(&suffix) {
            return Some(entry.path());
        }
    }
    None
}

fn load_fixture() -> Option<NativeLibrary> {
    let path = match fixture_path() {
        Some(path) => path,
        None => {
            eprintln!("fixture library not built, skipping test");
            return None;
        }
    };
    Some(NativeLibrary::load(&path).expect("failed to load fixture library"))
}

fn fib_signature() -> Signature {
    Signature::new("fib", vec![NativeType::I32], NativeType::I32)
}

fn result_layout() -> RecordLayout {
    RecordLayout::new(
        "Result",
        vec![
            RecordField::new("N", ScalarKind::I32),
            RecordField::new("L", ScalarKind::F32),
        ],
    )
}

fn fib_host(n: u64) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let tmp = b;
        b = a;
        a += tmp;
    }
    a
}

// ============================================================================
// Load and resolve
// ============================================================================

#[test]
fn loading_missing_path_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(platform_library_name("definitely_absent"));
    let err = NativeLibrary::load(&path).unwrap_err();
    assert!(matches!(err, FfiError::Load { .. }), "got {err}");
}

#[test]
fn loading_incompatible_artifact_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(platform_library_name("not_a_library"));
    std::fs::write(&path, b"this is not an object file").unwrap();
    let err = NativeLibrary::load(&path).unwrap_err();
    assert!(matches!(err, FfiError::Load { .. }), "got {err}");
}

#[test]
fn binding_absent_symbol_is_symbol_not_found() {
    let Some(lib) = load_fixture() else { return };
    let err = lib
        .bind(Signature::scalar_unary("no_such_entry_point"))
        .unwrap_err();
    assert!(matches!(err, FfiError::SymbolNotFound { .. }), "got {err}");
}

// ============================================================================
// Invocation
// ============================================================================

#[test]
fn fib_recurrence_holds_through_declared_call() {
    let Some(lib) = load_fixture() else { return };
    let fib = lib.bind(fib_signature()).unwrap();

    let call = |n: i64| -> i64 {
        let mut args = vec![Value::Int(n)];
        match fib.call(&mut args).unwrap() {
            Value::Int(result) => result,
            other => panic!("expected int result, got {other:?}"),
        }
    };

    assert_eq!(call(0), 0);
    assert_eq!(call(1), 1);
    for n in 2..=15 {
        assert_eq!(call(n), call(n - 1) + call(n - 2));
    }
}

#[test]
fn weird_function_marshals_mixed_scalars() {
    let Some(lib) = load_fixture() else { return };
    let sig = Signature::new(
        "weird_function",
        vec![NativeType::I32, NativeType::F32, NativeType::Char],
        NativeType::F64,
    );
    let bound = lib.bind(sig).unwrap();

    let mut args = vec![Value::Int(3), Value::Num(2.0), Value::Char(b'y')];
    assert_eq!(bound.call(&mut args).unwrap(), Value::Num(6.0));

    // A one-byte string is accepted where a char is declared
    let mut args = vec![Value::Int(3), Value::Num(2.0), Value::Str("n".into())];
    assert_eq!(bound.call(&mut args).unwrap(), Value::Num(12.0));
}

#[test]
fn hello_takes_a_string_and_returns_unit() {
    let Some(lib) = load_fixture() else { return };
    let sig = Signature::new("hello", vec![NativeType::CStr], NativeType::Void);
    let bound = lib.bind(sig).unwrap();

    let mut args = vec![Value::Str("world".into())];
    assert_eq!(bound.call(&mut args).unwrap(), Value::Unit);
}

#[test]
fn simulate_decodes_record_in_declared_order() {
    let Some(lib) = load_fixture() else { return };
    let sig = Signature::new(
        "simulate",
        vec![NativeType::F32, NativeType::F32],
        NativeType::Record(result_layout()),
    );
    let bound = lib.bind(sig).unwrap();

    let mut args = vec![Value::Num(10.0), Value::Num(0.5)];
    let result = bound.call(&mut args).unwrap();
    let record = match result {
        Value::Record(record) => record,
        other => panic!("expected record result, got {other:?}"),
    };

    let names: Vec<&str> = record.names().collect();
    assert_eq!(names, ["N", "L"]);
    assert_eq!(record.get("N"), Some(&Value::Int(20)));
    match record.get("L") {
        Some(Value::Num(l)) => assert!((l - 10.0).abs() < 1e-6),
        other => panic!("expected numeric L field, got {other:?}"),
    }
}

#[test]
fn output_buffers_are_fully_populated() {
    let Some(lib) = load_fixture() else { return };
    let sig = Signature::new(
        "fib_sequence",
        vec![NativeType::I32, NativeType::MutBufU64, NativeType::MutBufU64],
        NativeType::I32,
    );
    let bound = lib.bind(sig).unwrap();

    let n = 10usize;
    let mut args = vec![
        Value::Int(n as i64),
        Value::U64Array(vec![u64::MAX; n]),
        Value::U64Array(vec![u64::MAX; n]),
    ];
    let status = bound.call(&mut args).unwrap();
    assert_eq!(status, Value::Int(0));

    let seq0 = match &args[1] {
        Value::U64Array(buf) => buf,
        other => panic!("expected u64 buffer, got {other:?}"),
    };
    let seq1 = match &args[2] {
        Value::U64Array(buf) => buf,
        other => panic!("expected u64 buffer, got {other:?}"),
    };

    for i in 0..n {
        let fib_i = fib_host(i as u64);
        assert_eq!(seq0[i], fib_i, "seq0[{i}]");
        assert_eq!(seq1[i], fib_host(fib_i), "seq1[{i}]");
    }
}

// ============================================================================
// Pre-call rejections
// ============================================================================

#[test]
fn argument_count_mismatch_is_rejected() {
    let Some(lib) = load_fixture() else { return };
    let bound = lib.bind(fib_signature()).unwrap();

    let mut args = vec![Value::Int(1), Value::Int(2)];
    let err = bound.call(&mut args).unwrap_err();
    assert!(matches!(err, FfiError::ArgumentCount { .. }), "got {err}");
}

#[test]
fn argument_type_mismatch_is_rejected() {
    let Some(lib) = load_fixture() else { return };
    let bound = lib.bind(fib_signature()).unwrap();

    let mut args = vec![Value::Str("nine".into())];
    let err = bound.call(&mut args).unwrap_err();
    assert!(matches!(err, FfiError::ArgumentType { .. }), "got {err}");
}

#[test]
fn interior_nul_is_rejected_before_the_call() {
    let Some(lib) = load_fixture() else { return };
    let sig = Signature::new("hello", vec![NativeType::CStr], NativeType::Void);
    let bound = lib.bind(sig).unwrap();

    let mut args = vec![Value::Str("wor\0ld".into())];
    let err = bound.call(&mut args).unwrap_err();
    assert!(matches!(err, FfiError::ArgumentType { .. }), "got {err}");
}

#[test]
fn short_output_buffer_is_rejected() {
    let Some(lib) = load_fixture() else { return };
    let sig = Signature::new(
        "fib_sequence",
        vec![NativeType::I32, NativeType::MutBufU64, NativeType::MutBufU64],
        NativeType::I32,
    );
    let bound = lib.bind(sig).unwrap();

    let mut args = vec![
        Value::Int(10),
        Value::U64Array(vec![0; 4]),
        Value::U64Array(vec![0; 10]),
    ];
    let err = bound.call(&mut args).unwrap_err();
    assert!(
        matches!(err, FfiError::BufferLength { index: 1, .. }),
        "got {err}"
    );
}

#[test]
fn undeclared_shape_is_rejected_without_a_call() {
    let Some(lib) = load_fixture() else { return };
    let sig = Signature::new("fib", vec![NativeType::Char], NativeType::Char);
    let bound = lib.bind(sig).unwrap();

    let mut args = vec![Value::Char(b'a')];
    let err = bound.call(&mut args).unwrap_err();
    assert!(
        matches!(err, FfiError::UnsupportedSignature { .. }),
        "got {err}"
    );
}

// ============================================================================
// Signature files and the dynamic entry surface
// ============================================================================

#[test]
fn signature_file_drives_dynamic_calls() {
    let Some(path) = fixture_path() else {
        eprintln!("fixture library not built, skipping test");
        return;
    };
    let library = NativeLibrary::load(&path).unwrap();
    natcall::register_library("cfunctions", library).unwrap();

    let sig_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/native/cfunctions.ffi");
    natcall::attach_signatures("cfunctions", &sig_path).unwrap();

    let lib = Value::Str("cfunctions".into());

    let mut args = vec![Value::Int(9)];
    assert_eq!(
        ffi_call(&lib, &Value::Str("fib".into()), &mut args).unwrap(),
        Value::Int(34)
    );

    let mut args = vec![Value::Num(10.0), Value::Num(0.5)];
    let result = ffi_call(&lib, &Value::Str("simulate".into()), &mut args).unwrap();
    match result {
        Value::Record(record) => assert_eq!(record.get("N"), Some(&Value::Int(20))),
        other => panic!("expected record result, got {other:?}"),
    }

    let mut args = vec![Value::Int(4)];
    let err = ffi_call(&lib, &Value::Str("undeclared".into()), &mut args).unwrap_err();
    assert!(matches!(err, FfiError::UnknownSignature { .. }), "got {err}");
}

#[test]
fn ffi_load_resolves_via_search_path() {
    let Some(path) = fixture_path() else {
        eprintln!("fixture library not built, skipping test");
        return;
    };
    // Name-based lookup only works on the unhashed artifact
    if path.file_name().map(|n| n.to_string_lossy().into_owned())
        != Some(platform_library_name("natcall_testlib"))
    {
        eprintln!("fixture only present with a metadata hash, skipping test");
        return;
    }

    env::set_var("NATCALL_LIBRARY_PATH", path.parent().unwrap());
    let loaded = natcall::ffi_load(&Value::Str("natcall_testlib".into())).unwrap();
    env::remove_var("NATCALL_LIBRARY_PATH");
    assert_eq!(loaded, Value::Bool(true));
}
