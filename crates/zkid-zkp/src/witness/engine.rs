//! # circom WASM witness engine
//!
//! Runs a circom 2 witness generator under `wasmer`. Each engine owns its
//! own store and instance; nothing is shared between proofs.
//!
//! ## Signal protocol
//!
//! An input signal is addressed by the FNV-1a-64 hash of its name, split
//! into (hi, lo) `u32` halves. A value is reduced modulo the circuit prime
//! (negative values wrap), written as `n32` little-endian words into the
//! shared read/write memory, then committed with `setInputSignal`. Once
//! every input is set the module computes the witness, read back one
//! element at a time through the same shared memory.
//!
//! ## Diagnostics
//!
//! The module reports failures through `runtime.exceptionHandler(code)`,
//! preceded by `printErrorMessage` calls whose text is read with
//! `getMessageChar`. Both end up in [`WitnessError::Exception`].

use std::hash::Hasher;
use std::str::FromStr;

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use fnv::FnvHasher;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Signed, Zero};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use wasmer::{
    imports, Function, FunctionEnv, FunctionEnvMut, Instance, Memory, MemoryType, Module, RuntimeError, Store,
    TypedFunction,
};
use zeroize::Zeroize;

use super::{Witness, WitnessError};

/// Initial linear memory pages given to the module.
const MEMORY_PAGES: u32 = 2000;
/// Upper bound on a single diagnostic message.
const MAX_MESSAGE_LEN: usize = 4096;

/// Text of a circom runtime exception code.
pub fn exception_text(code: i32) -> &'static str {
    match code {
        1 => "Signal not found",
        2 => "Too many signals set",
        3 => "Signal already set",
        4 => "Assert Failed",
        5 => "Not enough memory",
        6 => "Input signal array access exceeds the size",
        _ => "Unknown error",
    }
}

/// FNV-1a-64 address of a signal name as `(hi, lo)`.
pub fn signal_address(name: &str) -> (u32, u32) {
    let mut hasher = FnvHasher::default();
    hasher.write(name.as_bytes());
    let h = hasher.finish();
    ((h >> 32) as u32, h as u32)
}

#[derive(Error, Debug)]
#[error("circom exception {0}")]
struct ExceptionTrap(i32);

#[derive(Default)]
struct RuntimeLog {
    exception: Option<i32>,
    errors: Vec<String>,
    buffer: String,
    n32: u32,
    get_message_char: Option<TypedFunction<(), i32>>,
    read_shared: Option<TypedFunction<i32, i32>>,
}

fn read_message(env: &mut FunctionEnvMut<RuntimeLog>) -> String {
    let (log, mut store) = env.data_and_store_mut();
    let Some(get_char) = log.get_message_char.clone() else {
        return String::new();
    };
    let mut out = String::new();
    while out.len() < MAX_MESSAGE_LEN {
        match get_char.call(&mut store) {
            Ok(c) if c > 0 => out.push(char::from(c as u8)),
            _ => break,
        }
    }
    out
}

fn exception_handler(mut env: FunctionEnvMut<RuntimeLog>, code: i32) -> Result<(), ExceptionTrap> {
    env.data_mut().exception = Some(code);
    Err(ExceptionTrap(code))
}

fn print_error_message(mut env: FunctionEnvMut<RuntimeLog>) {
    let message = read_message(&mut env);
    env.data_mut().errors.push(message);
}

fn write_buffer_message(mut env: FunctionEnvMut<RuntimeLog>) {
    let message = read_message(&mut env);
    let log = env.data_mut();
    if message == "\n" {
        debug!(target: "zkid_zkp::witness", "{}", log.buffer);
        log.buffer.clear();
    } else {
        if !log.buffer.is_empty() {
            log.buffer.push(' ');
        }
        log.buffer.push_str(&message);
    }
}

fn show_shared_rw_memory(mut env: FunctionEnvMut<RuntimeLog>) {
    let (log, mut store) = env.data_and_store_mut();
    let Some(read) = log.read_shared.clone() else {
        return;
    };
    let mut words = Vec::with_capacity(log.n32 as usize);
    for j in 0..log.n32 {
        match read.call(&mut store, j as i32) {
            Ok(w) => words.push(w as u32),
            Err(_) => return,
        }
    }
    let value = BigUint::from_slice(&words).to_string();
    if !log.buffer.is_empty() {
        log.buffer.push(' ');
    }
    log.buffer.push_str(&value);
}

struct Exports {
    get_input_size: TypedFunction<(), i32>,
    get_input_signal_size: TypedFunction<(i32, i32), i32>,
    set_input_signal: TypedFunction<(i32, i32, i32), ()>,
    write_shared: TypedFunction<(i32, i32), ()>,
    read_shared: TypedFunction<i32, i32>,
    get_witness_size: TypedFunction<(), i32>,
    get_witness: TypedFunction<i32, ()>,
}

/// One witness computation over a circom 2 WASM module.
pub struct WitnessEngine {
    store: Store,
    env: FunctionEnv<RuntimeLog>,
    exports: Exports,
    n32: u32,
    prime: BigUint,
    input_size: usize,
    inputs_set: usize,
    witness_size: usize,
}

fn module_err(e: impl std::fmt::Display) -> WitnessError {
    WitnessError::Module(e.to_string())
}

impl WitnessEngine {
    /// Compile and instantiate `wasm`, then check its version and prime.
    pub fn new(wasm: &[u8]) -> Result<Self, WitnessError> {
        let mut store = Store::default();
        let module = Module::new(&store, wasm).map_err(module_err)?;
        let memory = Memory::new(&mut store, MemoryType::new(MEMORY_PAGES, None, false)).map_err(module_err)?;
        let env = FunctionEnv::new(&mut store, RuntimeLog::default());
        let import_object = imports! {
            "env" => {
                "memory" => memory,
            },
            "runtime" => {
                "exceptionHandler" => Function::new_typed_with_env(&mut store, &env, exception_handler),
                "printErrorMessage" => Function::new_typed_with_env(&mut store, &env, print_error_message),
                "writeBufferMessage" => Function::new_typed_with_env(&mut store, &env, write_buffer_message),
                "showSharedRWMemory" => Function::new_typed_with_env(&mut store, &env, show_shared_rw_memory),
            },
        };
        let instance = Instance::new(&mut store, &module, &import_object).map_err(module_err)?;
        let e = &instance.exports;

        let version = e
            .get_typed_function::<(), i32>(&store, "getVersion")
            .map_err(module_err)?
            .call(&mut store)
            .map_err(module_err)?;
        if version != 2 {
            return Err(WitnessError::UnsupportedVersion(version as u32));
        }

        let exports = Exports {
            get_input_size: e.get_typed_function(&store, "getInputSize").map_err(module_err)?,
            get_input_signal_size: e.get_typed_function(&store, "getInputSignalSize").map_err(module_err)?,
            set_input_signal: e.get_typed_function(&store, "setInputSignal").map_err(module_err)?,
            write_shared: e.get_typed_function(&store, "writeSharedRWMemory").map_err(module_err)?,
            read_shared: e.get_typed_function(&store, "readSharedRWMemory").map_err(module_err)?,
            get_witness_size: e.get_typed_function(&store, "getWitnessSize").map_err(module_err)?,
            get_witness: e.get_typed_function(&store, "getWitness").map_err(module_err)?,
        };
        let n32 = e
            .get_typed_function::<(), i32>(&store, "getFieldNumLen32")
            .map_err(module_err)?
            .call(&mut store)
            .map_err(module_err)? as u32;
        let get_message_char = e.get_typed_function::<(), i32>(&store, "getMessageChar").ok();
        {
            let log = env.as_mut(&mut store);
            log.n32 = n32;
            log.get_message_char = get_message_char;
            log.read_shared = Some(exports.read_shared.clone());
        }

        let mut engine = Self {
            store,
            env,
            exports,
            n32,
            prime: BigUint::zero(),
            input_size: 0,
            inputs_set: 0,
            witness_size: 0,
        };

        let get_raw_prime: TypedFunction<(), ()> =
            instance.exports.get_typed_function(&engine.store, "getRawPrime").map_err(module_err)?;
        get_raw_prime.call(&mut engine.store).map_err(|e| engine.trap(e))?;
        engine.prime = BigUint::from_slice(&engine.read_words()?);
        let bn254 = BigUint::from_bytes_le(&Fr::MODULUS.to_bytes_le());
        if engine.prime != bn254 {
            return Err(WitnessError::PrimeMismatch(engine.prime.to_string()));
        }

        let init: TypedFunction<i32, ()> =
            instance.exports.get_typed_function(&engine.store, "init").map_err(module_err)?;
        init.call(&mut engine.store, 1).map_err(|e| engine.trap(e))?;

        engine.input_size = engine.call_i32(|x, s| x.get_input_size.call(s))? as usize;
        engine.witness_size = engine.call_i32(|x, s| x.get_witness_size.call(s))? as usize;
        debug!(n32, input_size = engine.input_size, witness_size = engine.witness_size, "witness engine ready");
        Ok(engine)
    }

    /// Signals the computed witness will hold.
    pub fn witness_size(&self) -> usize {
        self.witness_size
    }

    /// Input values the circuit expects in total.
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    fn trap(&self, err: RuntimeError) -> WitnessError {
        let log = self.env.as_ref(&self.store);
        match log.exception {
            Some(code) => {
                let mut message = exception_text(code).to_string();
                for line in log.errors.iter().filter(|l| !l.is_empty()) {
                    message.push_str(". ");
                    message.push_str(line);
                }
                WitnessError::Exception { code, message }
            }
            None => WitnessError::Trap(err.message()),
        }
    }

    fn call_i32(
        &mut self,
        f: impl FnOnce(&Exports, &mut Store) -> Result<i32, RuntimeError>,
    ) -> Result<i32, WitnessError> {
        f(&self.exports, &mut self.store).map_err(|e| self.trap(e))
    }

    fn read_words(&mut self) -> Result<Vec<u32>, WitnessError> {
        let mut words = Vec::with_capacity(self.n32 as usize);
        for j in 0..self.n32 {
            let w = self
                .exports
                .read_shared
                .call(&mut self.store, j as i32)
                .map_err(|e| self.trap(e))?;
            words.push(w as u32);
        }
        Ok(words)
    }

    fn reduce(&self, value: &BigInt) -> BigUint {
        let p = BigInt::from_biguint(Sign::Plus, self.prime.clone());
        let mut r = value % &p;
        if r.is_negative() {
            r += &p;
        }
        r.magnitude().clone()
    }

    /// Write element `index` of input signal `name`.
    pub fn set_signal(&mut self, name: &str, index: usize, value: &BigInt) -> Result<(), WitnessError> {
        let (hi, lo) = signal_address(name);
        let size = self.signal_size(name, hi, lo)?;
        if index >= size {
            return Err(WitnessError::InputSize {
                name: name.to_string(),
                expected: size,
                got: index + 1,
            });
        }
        self.write_value(hi, lo, index, value)
    }

    fn signal_size(&mut self, name: &str, hi: u32, lo: u32) -> Result<usize, WitnessError> {
        let size = self
            .exports
            .get_input_signal_size
            .call(&mut self.store, hi as i32, lo as i32)
            .map_err(|e| self.trap(e))?;
        if size < 0 {
            return Err(WitnessError::SignalNotFound(name.to_string()));
        }
        Ok(size as usize)
    }

    fn write_value(&mut self, hi: u32, lo: u32, index: usize, value: &BigInt) -> Result<(), WitnessError> {
        let mut words = self.reduce(value).to_u32_digits();
        words.resize(self.n32 as usize, 0);
        for (j, w) in words.iter().enumerate() {
            self.exports
                .write_shared
                .call(&mut self.store, j as i32, *w as i32)
                .map_err(|e| self.trap(e))?;
        }
        words.zeroize();
        self.exports
            .set_input_signal
            .call(&mut self.store, hi as i32, lo as i32, index as i32)
            .map_err(|e| self.trap(e))?;
        self.inputs_set += 1;
        Ok(())
    }

    /// Write every value of input signal `name`, flattening nested arrays
    /// in row-major order. The value count must equal the signal's size.
    pub fn set_input(&mut self, name: &str, value: &Value) -> Result<(), WitnessError> {
        let mut flat = Vec::new();
        flatten(name, value, &mut flat)?;
        let (hi, lo) = signal_address(name);
        let size = self.signal_size(name, hi, lo)?;
        if flat.len() != size {
            return Err(WitnessError::InputSize {
                name: name.to_string(),
                expected: size,
                got: flat.len(),
            });
        }
        for (i, v) in flat.iter().enumerate() {
            self.write_value(hi, lo, i, v)?;
        }
        Ok(())
    }

    /// Write every signal of a JSON input object.
    pub fn set_inputs(&mut self, inputs: &[u8]) -> Result<(), WitnessError> {
        let object: serde_json::Map<String, Value> =
            serde_json::from_slice(inputs).map_err(|e| WitnessError::InvalidInput(e.to_string()))?;
        for (name, value) in &object {
            self.set_input(name, value)?;
        }
        Ok(())
    }

    /// Read the computed witness. Fails unless every input value was set.
    pub fn compute(mut self) -> Result<Witness, WitnessError> {
        if self.inputs_set != self.input_size {
            return Err(WitnessError::IncompleteInputs {
                expected: self.input_size,
                set: self.inputs_set,
            });
        }
        let mut values = Vec::with_capacity(self.witness_size);
        let mut bytes = Vec::with_capacity(self.n32 as usize * 4);
        for i in 0..self.witness_size {
            self.exports
                .get_witness
                .call(&mut self.store, i as i32)
                .map_err(|e| self.trap(e))?;
            let mut words = self.read_words()?;
            bytes.clear();
            for w in &words {
                bytes.extend_from_slice(&w.to_le_bytes());
            }
            words.zeroize();
            values.push(Fr::from_le_bytes_mod_order(&bytes));
        }
        bytes.zeroize();
        Ok(Witness::from_values(values))
    }

    /// Compute the witness of `wasm` for a JSON input object.
    pub fn calculate(wasm: &[u8], inputs: &[u8]) -> Result<Witness, WitnessError> {
        let mut engine = Self::new(wasm)?;
        engine.set_inputs(inputs)?;
        engine.compute()
    }
}

/// Flatten a JSON input value into integers.
pub fn flatten(name: &str, value: &Value, out: &mut Vec<BigInt>) -> Result<(), WitnessError> {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten(name, item, out)?;
            }
            Ok(())
        }
        Value::String(s) => {
            out.push(parse_int(s).ok_or_else(|| {
                WitnessError::InvalidInput(format!("{name}: {s:?} is not an integer"))
            })?);
            Ok(())
        }
        Value::Number(n) => {
            let v = if let Some(u) = n.as_u64() {
                BigInt::from(u)
            } else if let Some(i) = n.as_i64() {
                BigInt::from(i)
            } else {
                return Err(WitnessError::InvalidInput(format!("{name}: {n} is not an integer")));
            };
            out.push(v);
            Ok(())
        }
        Value::Bool(b) => {
            out.push(BigInt::from(u8::from(*b)));
            Ok(())
        }
        Value::Null | Value::Object(_) => Err(WitnessError::InvalidInput(format!(
            "{name}: expected an integer or array"
        ))),
    }
}

fn parse_int(s: &str) -> Option<BigInt> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return BigInt::parse_bytes(hex.as_bytes(), 16);
    }
    BigInt::from_str(s).ok()
}
