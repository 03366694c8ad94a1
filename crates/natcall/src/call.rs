//! Marshalling and dispatch over the supported native call shapes.
//!
//! Every supported shape is a typed `unsafe extern "C" fn` alias; a declared
//! signature outside the table is rejected with
//! [`FfiError::UnsupportedSignature`] before any native code runs.

use libloading::Symbol;
use std::ffi::CString;
use std::os::raw::c_char;

use crate::error::FfiError;
use crate::library::NativeLibrary;
use crate::types::{NativeType, RecordLayout, ScalarKind, Signature};
use crate::value::{RecordValue, Value};

pub(crate) fn dispatch(
    library: &NativeLibrary,
    sig: &Signature,
    args: &mut [Value],
) -> Result<Value, FfiError> {
    if args.len() != sig.args.len() {
        return Err(FfiError::ArgumentCount {
            function: sig.name.clone(),
            expected: sig.args.len(),
            got: args.len(),
        });
    }

    log::debug!("dispatching '{}' as {}", sig.name, sig);

    use NativeType as T;
    match (sig.args.as_slice(), &sig.ret) {
        (scalars, T::F64)
            if scalars.len() <= 5 && scalars.iter().all(|t| *t == T::F64) =>
        {
            call_f64_scalars(library, sig, args)
        }
        ([T::I32], T::I32) => call_i32_unary(library, sig, args),
        ([T::I64], T::I64) => call_i64_unary(library, sig, args),
        ([T::I32, T::F32, T::Char], T::F64) => call_i32_f32_char(library, sig, args),
        ([T::CStr], T::Void) => call_cstr(library, sig, args),
        ([T::F32, T::F32], T::Record(layout)) => {
            let x = want_f32(sig, 0, &args[0])?;
            let y = want_f32(sig, 1, &args[1])?;
            call_record_pair(library, sig, layout, x, y)
        }
        ([T::F64, T::F64], T::Record(layout)) => {
            let x = want_f64(sig, 0, &args[0])?;
            let y = want_f64(sig, 1, &args[1])?;
            call_record_pair(library, sig, layout, x, y)
        }
        ([T::I32, T::MutBufU64, T::MutBufU64], T::I32) => {
            call_out_buffer_pair(library, sig, args, true)
        }
        ([T::I32, T::MutBufU64, T::MutBufU64], T::Void) => {
            call_out_buffer_pair(library, sig, args, false)
        }
        _ => Err(unsupported(sig)),
    }
}

/// Call an all-f64 scalar function with 0 through 5 arguments.
fn call_f64_scalars(
    library: &NativeLibrary,
    sig: &Signature,
    args: &[Value],
) -> Result<Value, FfiError> {
    let mut scalars = Vec::with_capacity(args.len());
    for (index, value) in args.iter().enumerate() {
        scalars.push(want_f64(sig, index, value)?);
    }

    let result = match scalars.as_slice() {
        [] => {
            type Fn0 = unsafe extern "C" fn() -> f64;
            let func: Symbol<Fn0> = unsafe { library.get(&sig.name)? };
            unsafe { func() }
        }
        [x] => {
            type Fn1 = unsafe extern "C" fn(f64) -> f64;
            let func: Symbol<Fn1> = unsafe { library.get(&sig.name)? };
            unsafe { func(*x) }
        }
        [x, y] => {
            type Fn2 = unsafe extern "C" fn(f64, f64) -> f64;
            let func: Symbol<Fn2> = unsafe { library.get(&sig.name)? };
            unsafe { func(*x, *y) }
        }
        [x, y, z] => {
            type Fn3 = unsafe extern "C" fn(f64, f64, f64) -> f64;
            let func: Symbol<Fn3> = unsafe { library.get(&sig.name)? };
            unsafe { func(*x, *y, *z) }
        }
        [x, y, z, w] => {
            type Fn4 = unsafe extern "C" fn(f64, f64, f64, f64) -> f64;
            let func: Symbol<Fn4> = unsafe { library.get(&sig.name)? };
            unsafe { func(*x, *y, *z, *w) }
        }
        [x, y, z, w, v] => {
            type Fn5 = unsafe extern "C" fn(f64, f64, f64, f64, f64) -> f64;
            let func: Symbol<Fn5> = unsafe { library.get(&sig.name)? };
            unsafe { func(*x, *y, *z, *w, *v) }
        }
        _ => return Err(unsupported(sig)),
    };

    Ok(Value::Num(result))
}

/// Call (i32) -> i32
fn call_i32_unary(
    library: &NativeLibrary,
    sig: &Signature,
    args: &[Value],
) -> Result<Value, FfiError> {
    type UnaryFn = unsafe extern "C" fn(i32) -> i32;

    let n = want_i32(sig, 0, &args[0])?;
    let func: Symbol<UnaryFn> = unsafe { library.get(&sig.name)? };
    let result = unsafe { func(n) };
    Ok(Value::Int(i64::from(result)))
}

/// Call (i64) -> i64
fn call_i64_unary(
    library: &NativeLibrary,
    sig: &Signature,
    args: &[Value],
) -> Result<Value, FfiError> {
    type UnaryFn = unsafe extern "C" fn(i64) -> i64;

    let n = want_i64(sig, 0, &args[0])?;
    let func: Symbol<UnaryFn> = unsafe { library.get(&sig.name)? };
    let result = unsafe { func(n) };
    Ok(Value::Int(result))
}

/// Call (i32, f32, char) -> f64
fn call_i32_f32_char(
    library: &NativeLibrary,
    sig: &Signature,
    args: &[Value],
) -> Result<Value, FfiError> {
    type MixedFn = unsafe extern "C" fn(i32, f32, c_char) -> f64;

    let n = want_i32(sig, 0, &args[0])?;
    let x = want_f32(sig, 1, &args[1])?;
    let c = want_char(sig, 2, &args[2])?;

    let func: Symbol<MixedFn> = unsafe { library.get(&sig.name)? };
    let result = unsafe { func(n, x, c as c_char) };
    Ok(Value::Num(result))
}

/// Call (cstr) -> void. The string is copied into a null-terminated buffer
/// that lives for the duration of the call.
fn call_cstr(
    library: &NativeLibrary,
    sig: &Signature,
    args: &[Value],
) -> Result<Value, FfiError> {
    type CStrFn = unsafe extern "C" fn(*const c_char);

    let s = want_str(sig, 0, &args[0])?;
    let c_string = CString::new(s).map_err(|_| FfiError::ArgumentType {
        function: sig.name.clone(),
        index: 0,
        expected: "a string without interior NUL bytes",
        got: "a string with an interior NUL".to_string(),
    })?;

    let func: Symbol<CStrFn> = unsafe { library.get(&sig.name)? };
    unsafe { func(c_string.as_ptr()) };
    Ok(Value::Unit)
}

/// Call (i32, ptr_mut<u64>, ptr_mut<u64>) -> i32 | void.
///
/// Both buffers stay owned by the caller; the native side writes the first
/// `n` elements in place. Lengths are checked before the call so the native
/// side can never be handed a buffer shorter than it was promised.
fn call_out_buffer_pair(
    library: &NativeLibrary,
    sig: &Signature,
    args: &mut [Value],
    has_status: bool,
) -> Result<Value, FfiError> {
    let n = want_i32(sig, 0, &args[0])?;
    let need = usize::try_from(n).map_err(|_| FfiError::ArgumentType {
        function: sig.name.clone(),
        index: 0,
        expected: "a non-negative element count",
        got: n.to_string(),
    })?;

    let (seq0, len0) = want_u64_buffer(sig, 1, &mut args[1])?;
    if len0 < need {
        return Err(FfiError::BufferLength {
            function: sig.name.clone(),
            index: 1,
            need,
            got: len0,
        });
    }
    let (seq1, len1) = want_u64_buffer(sig, 2, &mut args[2])?;
    if len1 < need {
        return Err(FfiError::BufferLength {
            function: sig.name.clone(),
            index: 2,
            need,
            got: len1,
        });
    }

    if has_status {
        type FillFn = unsafe extern "C" fn(i32, *mut u64, *mut u64) -> i32;
        let func: Symbol<FillFn> = unsafe { library.get(&sig.name)? };
        let status = unsafe { func(n, seq0, seq1) };
        Ok(Value::Int(i64::from(status)))
    } else {
        type FillFn = unsafe extern "C" fn(i32, *mut u64, *mut u64);
        let func: Symbol<FillFn> = unsafe { library.get(&sig.name)? };
        unsafe { func(n, seq0, seq1) };
        Ok(Value::Unit)
    }
}

// ---------------------------------------------------------------------------
// Record returns
// ---------------------------------------------------------------------------

/// By-value return slot for a two-field record. `#[repr(C)]` so the layout
/// matches `struct { A first; B second; }` under the platform ABI.
#[repr(C)]
#[derive(Clone, Copy)]
struct RawPair<A, B> {
    first: A,
    second: B,
}

type PairFn<C, A, B> = unsafe extern "C" fn(C, C) -> RawPair<A, B>;

trait RecordScalar: Copy {
    fn into_value(self) -> Value;
}

impl RecordScalar for i32 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl RecordScalar for i64 {
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl RecordScalar for f32 {
    fn into_value(self) -> Value {
        Value::Num(f64::from(self))
    }
}

impl RecordScalar for f64 {
    fn into_value(self) -> Value {
        Value::Num(self)
    }
}

/// Call a record-returning function with two same-typed scalar arguments,
/// monomorphizing over the declared field kinds.
fn call_record_pair<C: Copy>(
    library: &NativeLibrary,
    sig: &Signature,
    layout: &RecordLayout,
    x: C,
    y: C,
) -> Result<Value, FfiError> {
    let (first, second) = match layout.kind_pair() {
        Some(pair) => pair,
        None => return Err(unsupported(sig)),
    };

    use ScalarKind::*;
    let record = match (first, second) {
        (I32, I32) => read_record_pair::<C, i32, i32>(library, sig, layout, x, y)?,
        (I32, I64) => read_record_pair::<C, i32, i64>(library, sig, layout, x, y)?,
        (I32, F32) => read_record_pair::<C, i32, f32>(library, sig, layout, x, y)?,
        (I32, F64) => read_record_pair::<C, i32, f64>(library, sig, layout, x, y)?,
        (I64, I32) => read_record_pair::<C, i64, i32>(library, sig, layout, x, y)?,
        (I64, I64) => read_record_pair::<C, i64, i64>(library, sig, layout, x, y)?,
        (I64, F32) => read_record_pair::<C, i64, f32>(library, sig, layout, x, y)?,
        (I64, F64) => read_record_pair::<C, i64, f64>(library, sig, layout, x, y)?,
        (F32, I32) => read_record_pair::<C, f32, i32>(library, sig, layout, x, y)?,
        (F32, I64) => read_record_pair::<C, f32, i64>(library, sig, layout, x, y)?,
        (F32, F32) => read_record_pair::<C, f32, f32>(library, sig, layout, x, y)?,
        (F32, F64) => read_record_pair::<C, f32, f64>(library, sig, layout, x, y)?,
        (F64, I32) => read_record_pair::<C, f64, i32>(library, sig, layout, x, y)?,
        (F64, I64) => read_record_pair::<C, f64, i64>(library, sig, layout, x, y)?,
        (F64, F32) => read_record_pair::<C, f64, f32>(library, sig, layout, x, y)?,
        (F64, F64) => read_record_pair::<C, f64, f64>(library, sig, layout, x, y)?,
    };

    Ok(Value::Record(record))
}

fn read_record_pair<C: Copy, A: RecordScalar, B: RecordScalar>(
    library: &NativeLibrary,
    sig: &Signature,
    layout: &RecordLayout,
    x: C,
    y: C,
) -> Result<RecordValue, FfiError> {
    let func: Symbol<PairFn<C, A, B>> = unsafe { library.get(&sig.name)? };
    let raw = unsafe { func(x, y) };
    Ok(RecordValue::from_fields(vec![
        (layout.fields[0].name.clone(), raw.first.into_value()),
        (layout.fields[1].name.clone(), raw.second.into_value()),
    ]))
}

// ---------------------------------------------------------------------------
// Argument extraction
// ---------------------------------------------------------------------------

fn want_f64(sig: &Signature, index: usize, value: &Value) -> Result<f64, FfiError> {
    value
        .as_f64()
        .ok_or_else(|| bad_argument(sig, index, "a numeric scalar", value))
}

fn want_f32(sig: &Signature, index: usize, value: &Value) -> Result<f32, FfiError> {
    Ok(want_f64(sig, index, value)? as f32)
}

fn want_i64(sig: &Signature, index: usize, value: &Value) -> Result<i64, FfiError> {
    value
        .as_i64()
        .ok_or_else(|| bad_argument(sig, index, "an integer scalar", value))
}

fn want_i32(sig: &Signature, index: usize, value: &Value) -> Result<i32, FfiError> {
    let wide = want_i64(sig, index, value)?;
    i32::try_from(wide).map_err(|_| bad_argument(sig, index, "a 32-bit integer", value))
}

fn want_char(sig: &Signature, index: usize, value: &Value) -> Result<u8, FfiError> {
    value
        .as_byte_char()
        .ok_or_else(|| bad_argument(sig, index, "a single-byte character", value))
}

fn want_str<'a>(sig: &Signature, index: usize, value: &'a Value) -> Result<&'a str, FfiError> {
    value
        .as_str()
        .ok_or_else(|| bad_argument(sig, index, "a string", value))
}

fn want_u64_buffer(
    sig: &Signature,
    index: usize,
    value: &mut Value,
) -> Result<(*mut u64, usize), FfiError> {
    match value {
        Value::U64Array(buf) => Ok((buf.as_mut_ptr(), buf.len())),
        other => Err(bad_argument(sig, index, "a u64 buffer", other)),
    }
}

fn bad_argument(sig: &Signature, index: usize, expected: &'static str, value: &Value) -> FfiError {
    FfiError::ArgumentType {
        function: sig.name.clone(),
        index,
        expected,
        got: value.kind().to_string(),
    }
}

fn unsupported(sig: &Signature) -> FfiError {
    FfiError::UnsupportedSignature {
        function: sig.name.clone(),
        signature: sig.to_string(),
    }
}
