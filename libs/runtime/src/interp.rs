// This file is part of OpenGMS.
//
// OpenGMS is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// OpenGMS is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with OpenGMS.  If not, see <http://www.gnu.org/licenses/>.
use crate::World;
use anyhow::Result;
use gml::{
    decode_at, scope, Comparison, DataType, Extension, GmArray, Instr, Opcode, RefKind, SymbolRef,
    Value, POPENV_BREAK,
};
use log::{debug, trace};
use smallvec::SmallVec;
use std::{cmp::Ordering, collections::HashMap};
use thiserror::Error;

/// Instance ids start above this; smaller non-negative scope values are
/// object indices.
pub const ID_THRESHOLD: i64 = 100_000;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("stack underflow in {code} at {ip:08X}")]
    StackUnderflow { code: String, ip: usize },
    #[error("unknown builtin function {name} ({argc} args)")]
    UnknownBuiltin { name: String, argc: usize },
    #[error("type error in {code} at {ip:08X}: {detail}")]
    TypeError {
        code: String,
        ip: usize,
        detail: String,
    },
    #[error("negative array index in {code} at {ip:08X}")]
    BadIndex { code: String, ip: usize },
    #[error("{what} index {index} out of range in {code} at {ip:08X}")]
    BadRef {
        what: &'static str,
        index: usize,
        code: String,
        ip: usize,
    },
}

/// One call frame. The value stack itself is shared in the world; `base`
/// fences this frame's slots so underflows are caught per frame.
struct Frame {
    self_id: i64,
    other_id: i64,
    locals: HashMap<u32, Value>,
    args: Vec<Value>,
    base: usize,
}

/// One `with` iteration frame: a snapshot of targets taken at entry.
/// Instances destroyed mid-iteration are skipped; instances created during
/// the iteration are absent from the snapshot and never visited.
struct EnvFrame {
    targets: Vec<u32>,
    pos: usize,
    saved_self: i64,
    saved_other: i64,
}

/// Split a flattened 2-D index the way the compiler merged it.
#[inline]
fn split_index(index: i32) -> (i32, i32) {
    (index / 32000, index % 32000)
}

/// Run one code entry to completion and return its result. Scripts recurse
/// through here; events enter through the dispatcher.
pub fn execute_code(
    world: &mut World,
    code_index: u32,
    self_id: i64,
    other_id: i64,
    args: &[Value],
) -> Result<Value> {
    let assets = world.assets.clone();
    let entry = &assets.code.entries[code_index as usize];
    let code_name = assets.string(entry.name);
    let start = entry.offset;
    let end = entry.offset + entry.length;
    let trace_instr = world.trace.instructions.matches(code_name);

    let mut frame = Frame {
        self_id,
        other_id,
        locals: HashMap::new(),
        args: args.to_vec(),
        base: world.stack.len(),
    };
    let mut envs: Vec<EnvFrame> = Vec::new();
    let mut ip = start;

    let result = loop {
        if ip >= end || ip < start {
            break Value::Undefined;
        }
        let instr = decode_at(&assets.code.blob, ip)?;
        if trace_instr {
            trace!("{}:{:08X}: {:?}", code_name, ip - start, instr.opcode);
        }
        let mut next_ip = ip + instr.size;
        match instr.opcode {
            Opcode::Conv => {
                let value = pop(world, &frame, code_name, ip)?;
                push(world, convert(value, instr.type2, code_name, ip)?);
            }
            Opcode::Add => {
                let b = pop(world, &frame, code_name, ip)?;
                let a = pop(world, &frame, code_name, ip)?;
                push(world, add_values(a, b, code_name, ip)?);
            }
            Opcode::Sub => {
                let (a, b) = pop2(world, &frame, code_name, ip)?;
                push(world, Value::Real(a.to_real()? - b.to_real()?));
            }
            Opcode::Mul => {
                let (a, b) = pop2(world, &frame, code_name, ip)?;
                push(world, Value::Real(a.to_real()? * b.to_real()?));
            }
            Opcode::Div => {
                let (a, b) = pop2(world, &frame, code_name, ip)?;
                push(world, divide(a.to_real()?, b.to_real()?, &instr));
            }
            Opcode::Rem => {
                let (a, b) = pop2(world, &frame, code_name, ip)?;
                let (a, b) = (a.to_real()?, b.to_real()?);
                push(world, Value::Real(if b == 0.0 { 0.0 } else { a % b }));
            }
            Opcode::Mod => {
                let (a, b) = pop2(world, &frame, code_name, ip)?;
                let (a, b) = (a.to_real()?, b.to_real()?);
                push(
                    world,
                    Value::Real(if b == 0.0 { 0.0 } else { a - b * (a / b).floor() }),
                );
            }
            Opcode::And => {
                let (a, b) = pop2(world, &frame, code_name, ip)?;
                push(world, Value::Real(((a.to_real()? as i64) & (b.to_real()? as i64)) as f64));
            }
            Opcode::Or => {
                let (a, b) = pop2(world, &frame, code_name, ip)?;
                push(world, Value::Real(((a.to_real()? as i64) | (b.to_real()? as i64)) as f64));
            }
            Opcode::Xor => {
                let (a, b) = pop2(world, &frame, code_name, ip)?;
                push(world, Value::Real(((a.to_real()? as i64) ^ (b.to_real()? as i64)) as f64));
            }
            Opcode::Shl => {
                let (a, b) = pop2(world, &frame, code_name, ip)?;
                let shift = (b.to_real()? as i64).clamp(0, 63) as u32;
                push(world, Value::Real(((a.to_real()? as i64) << shift) as f64));
            }
            Opcode::Shr => {
                let (a, b) = pop2(world, &frame, code_name, ip)?;
                let shift = (b.to_real()? as i64).clamp(0, 63) as u32;
                push(world, Value::Real(((a.to_real()? as i64) >> shift) as f64));
            }
            Opcode::Neg => {
                let a = pop(world, &frame, code_name, ip)?;
                push(world, Value::Real(-a.to_real()?));
            }
            Opcode::Not => {
                let a = pop(world, &frame, code_name, ip)?;
                if instr.type1 == DataType::Bool {
                    push(world, Value::bool(!a.to_bool()?));
                } else {
                    push(world, Value::Real(!(a.to_real()? as i64) as f64));
                }
            }
            Opcode::Cmp => {
                let (a, b) = pop2(world, &frame, code_name, ip)?;
                let relation = instr.comparison.unwrap_or(Comparison::Eq);
                push(world, Value::bool(compare(&a, &b, relation)?));
            }
            Opcode::PushI => push(world, Value::Real(f64::from(instr.operand16))),
            Opcode::Push | Opcode::PushLoc | Opcode::PushGlb | Opcode::PushBltn => {
                if instr.type1 == DataType::Var {
                    let var = SymbolRef::from_word(instr.extension.u32());
                    let var_scope = match instr.opcode {
                        Opcode::PushLoc => i64::from(scope::LOCAL),
                        Opcode::PushGlb => i64::from(scope::GLOBAL),
                        Opcode::PushBltn => i64::from(scope::BUILTIN),
                        _ => i64::from(instr.operand16),
                    };
                    let value = push_variable(world, &frame, var, var_scope, code_name, ip)?;
                    push(world, value);
                } else {
                    push(world, literal(&instr, &assets, code_name, ip)?);
                }
            }
            Opcode::Pop => {
                let var = SymbolRef::from_word(instr.extension.u32());
                pop_variable(world, &mut frame, &instr, var, code_name, ip)?;
            }
            Opcode::Dup => {
                let slots = (instr.operand16 & 0xFF) as usize + 1;
                if world.stack.len() < frame.base + slots {
                    return Err(VmError::StackUnderflow {
                        code: code_name.to_owned(),
                        ip,
                    }
                    .into());
                }
                let len = world.stack.len();
                for i in 0..slots {
                    let value = world.stack[len - slots + i].clone();
                    world.stack.push(value);
                }
            }
            Opcode::Popz => {
                pop(world, &frame, code_name, ip)?;
            }
            Opcode::B => {
                next_ip = instr.branch_target(ip) as usize;
            }
            Opcode::Bt => {
                if pop(world, &frame, code_name, ip)?.to_bool()? {
                    next_ip = instr.branch_target(ip) as usize;
                }
            }
            Opcode::Bf => {
                if !pop(world, &frame, code_name, ip)?.to_bool()? {
                    next_ip = instr.branch_target(ip) as usize;
                }
            }
            Opcode::PushEnv => {
                let target = pop(world, &frame, code_name, ip)?.to_real()? as i64;
                let targets = env_targets(world, &frame, target);
                if targets.is_empty() {
                    next_ip = instr.branch_target(ip) as usize;
                } else {
                    let first = targets[0];
                    envs.push(EnvFrame {
                        pos: 0,
                        saved_self: frame.self_id,
                        saved_other: frame.other_id,
                        targets,
                    });
                    frame.other_id = frame.self_id;
                    frame.self_id = i64::from(first);
                }
            }
            Opcode::PopEnv => {
                if instr.operand24 == POPENV_BREAK {
                    if let Some(env) = envs.pop() {
                        frame.self_id = env.saved_self;
                        frame.other_id = env.saved_other;
                    }
                } else if let Some(env) = envs.last_mut() {
                    env.pos += 1;
                    while env.pos < env.targets.len()
                        && !world.instance_alive(env.targets[env.pos])
                    {
                        env.pos += 1;
                    }
                    if env.pos < env.targets.len() {
                        frame.self_id = i64::from(env.targets[env.pos]);
                        next_ip = instr.branch_target(ip) as usize;
                    } else if let Some(env) = envs.pop() {
                        frame.self_id = env.saved_self;
                        frame.other_id = env.saved_other;
                    }
                }
            }
            Opcode::Call => {
                let argc = instr.operand16 as usize;
                let func = SymbolRef::from_word(instr.extension.u32());
                let index = func.index as usize;
                if index >= assets.functions.len() {
                    return Err(VmError::BadRef {
                        what: "function",
                        index,
                        code: code_name.to_owned(),
                        ip,
                    }
                    .into());
                }
                let name = assets.string(assets.functions[index].name);
                let mut call_args: SmallVec<[Value; 8]> = SmallVec::with_capacity(argc);
                for _ in 0..argc {
                    call_args.push(pop(world, &frame, code_name, ip)?);
                }
                if world.trace.calls.matches(name) && !world.trace.ignore_calls.contains(name) {
                    debug!("call {}({:?}) from {}", name, call_args, code_name);
                }
                let result =
                    call_function(world, name, frame.self_id, frame.other_id, &call_args)?;
                push(world, result);
            }
            Opcode::CallV => {
                let callee = pop(world, &frame, code_name, ip)?;
                let argc = instr.operand16 as usize;
                let mut call_args: SmallVec<[Value; 8]> = SmallVec::with_capacity(argc);
                for _ in 0..argc {
                    call_args.push(pop(world, &frame, code_name, ip)?);
                }
                let result = match &callee {
                    Value::Str(name) => {
                        call_function(world, name, frame.self_id, frame.other_id, &call_args)?
                    }
                    other => {
                        let script = other.to_i32()?;
                        call_script(world, script, frame.self_id, frame.other_id, &call_args)?
                    }
                };
                push(world, result);
            }
            Opcode::Break => {
                // Signal word; nothing to do for the titles in scope.
            }
            Opcode::Ret => {
                let value = pop(world, &frame, code_name, ip)?;
                world.stack.truncate(frame.base);
                return Ok(value);
            }
            Opcode::Exit => {
                world.stack.truncate(frame.base);
                return Ok(Value::Undefined);
            }
        }
        ip = next_ip;
    };

    world.stack.truncate(frame.base);
    Ok(result)
}

/// Dispatch a call by name: user scripts shadow nothing, builtins cover the
/// rest, anything else is fatal with the name and argc in the diagnostic.
pub fn call_function(
    world: &mut World,
    name: &str,
    self_id: i64,
    other_id: i64,
    args: &[Value],
) -> Result<Value> {
    if let Some(script) = world.assets.script_by_name(name) {
        return call_script(world, script as i32, self_id, other_id, args);
    }
    if let Some(f) = world.builtins.get(name) {
        return f(world, self_id, other_id, args);
    }
    Err(VmError::UnknownBuiltin {
        name: name.to_owned(),
        argc: args.len(),
    }
    .into())
}

pub fn call_script(
    world: &mut World,
    script: i32,
    self_id: i64,
    other_id: i64,
    args: &[Value],
) -> Result<Value> {
    if script < 0 || script as usize >= world.assets.scripts.len() {
        return Err(VmError::UnknownBuiltin {
            name: format!("script #{script}"),
            argc: args.len(),
        }
        .into());
    }
    let code = world.assets.scripts[script as usize].code;
    if code < 0 {
        return Ok(Value::Undefined);
    }
    execute_code(world, code as u32, self_id, other_id, args)
}

#[inline]
fn push(world: &mut World, value: Value) {
    world.stack.push(value);
}

fn pop(world: &mut World, frame: &Frame, code: &str, ip: usize) -> Result<Value> {
    if world.stack.len() <= frame.base {
        return Err(VmError::StackUnderflow {
            code: code.to_owned(),
            ip,
        }
        .into());
    }
    Ok(world.stack.pop().unwrap_or_default())
}

fn pop2(world: &mut World, frame: &Frame, code: &str, ip: usize) -> Result<(Value, Value)> {
    let b = pop(world, frame, code, ip)?;
    let a = pop(world, frame, code, ip)?;
    Ok((a, b))
}

fn literal(instr: &Instr, assets: &gamedata::GameData, code: &str, ip: usize) -> Result<Value> {
    Ok(match (instr.type1, instr.extension) {
        (DataType::Str, Extension::U32(index)) => {
            if index as usize >= assets.strings.len() {
                return Err(VmError::BadRef {
                    what: "string",
                    index: index as usize,
                    code: code.to_owned(),
                    ip,
                }
                .into());
            }
            Value::string(assets.string(index))
        }
        (DataType::Int32, Extension::U32(v)) => Value::Real(f64::from(v as i32)),
        (DataType::Bool, Extension::U32(v)) => Value::bool(v != 0),
        (_, Extension::F64(v)) => Value::Real(v),
        _ => Value::Real(f64::from(instr.operand16)),
    })
}

fn convert(value: Value, target: DataType, code: &str, ip: usize) -> Result<Value> {
    Ok(match target {
        DataType::Double | DataType::Float => Value::Real(coerce_real(&value, code, ip)?),
        DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            Value::Real(coerce_real(&value, code, ip)? as i64 as f64)
        }
        DataType::Bool => Value::bool(coerce_real(&value, code, ip)? >= 0.5),
        DataType::Str => Value::Str(std::rc::Rc::from(value.to_display()?.as_str())),
        DataType::Var => value,
    })
}

fn coerce_real(value: &Value, code: &str, ip: usize) -> Result<f64> {
    value.to_real().map_err(|e| {
        VmError::TypeError {
            code: code.to_owned(),
            ip,
            detail: e.to_string(),
        }
        .into()
    })
}

/// Addition is the one overloaded operator: string + string concatenates,
/// mixing a string into numeric addition is a type error.
fn add_values(a: Value, b: Value, code: &str, ip: usize) -> Result<Value> {
    match (&a, &b) {
        (Value::Str(x), Value::Str(y)) => {
            let mut out = x.to_string();
            out.push_str(y);
            Ok(Value::from(out))
        }
        (Value::Str(_), _) | (_, Value::Str(_)) => Err(VmError::TypeError {
            code: code.to_owned(),
            ip,
            detail: format!("cannot add {} and {}", a.type_name(), b.type_name()),
        }
        .into()),
        _ => Ok(Value::Real(a.to_real()? + b.to_real()?)),
    }
}

/// Division by zero keeps the source's sentinels: zero for integer-typed
/// operands, signed infinity for reals.
fn divide(a: f64, b: f64, instr: &Instr) -> Value {
    if b == 0.0 {
        let int_types = |t: DataType| {
            matches!(
                t,
                DataType::Int16 | DataType::Int32 | DataType::Int64 | DataType::Bool
            )
        };
        if int_types(instr.type1) && int_types(instr.type2) {
            return Value::Real(0.0);
        }
        return Value::Real(if a < 0.0 {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    Value::Real(a / b)
}

fn compare(a: &Value, b: &Value, relation: Comparison) -> Result<bool> {
    Ok(match relation {
        Comparison::Eq => a.loose_eq(b),
        Comparison::Ne => !a.loose_eq(b),
        Comparison::Lt => a.loose_cmp(b)? == Ordering::Less,
        Comparison::Le => a.loose_cmp(b)? != Ordering::Greater,
        Comparison::Gt => a.loose_cmp(b)? == Ordering::Greater,
        Comparison::Ge => a.loose_cmp(b)? != Ordering::Less,
    })
}

/// Resolve a scope-or-id value to a live instance id.
fn target_instance(world: &World, frame: &Frame, target: i64) -> Option<u32> {
    let id = match target {
        t if t >= ID_THRESHOLD => t,
        t if t >= 0 => return world.first_instance_of(t as u32),
        t if t == i64::from(scope::SELF) => frame.self_id,
        t if t == i64::from(scope::OTHER) => frame.other_id,
        _ => return None,
    };
    if id >= 0 && world.instances.contains_key(&(id as u32)) {
        Some(id as u32)
    } else {
        None
    }
}

/// Snapshot the iteration list for pushenv.
fn env_targets(world: &World, frame: &Frame, target: i64) -> Vec<u32> {
    match target {
        t if t == i64::from(scope::ALL) => world.live_ids(),
        t if t == i64::from(scope::NOONE) => Vec::new(),
        t if t == i64::from(scope::SELF) => single_alive(world, frame.self_id),
        t if t == i64::from(scope::OTHER) => single_alive(world, frame.other_id),
        t if t >= ID_THRESHOLD => single_alive(world, t),
        t if t >= 0 => world.instances_of(t as u32),
        _ => Vec::new(),
    }
}

fn single_alive(world: &World, id: i64) -> Vec<u32> {
    if id >= 0 && world.instance_alive(id as u32) {
        vec![id as u32]
    } else {
        Vec::new()
    }
}

fn push_variable(
    world: &mut World,
    frame: &Frame,
    var: SymbolRef,
    var_scope: i64,
    code: &str,
    ip: usize,
) -> Result<Value> {
    check_var_index(world, var.index, code, ip)?;
    match var.kind {
        RefKind::Normal => read_scoped(world, frame, var_scope, var.index, code, ip),
        RefKind::StackTop => {
            let target = pop(world, frame, code, ip)?.to_real()? as i64;
            read_scoped(world, frame, target, var.index, code, ip)
        }
        RefKind::Array => {
            let index = pop(world, frame, code, ip)?.to_i32()?;
            if index < 0 {
                return Err(VmError::BadIndex {
                    code: code.to_owned(),
                    ip,
                }
                .into());
            }
            let (row, col) = split_index(index);
            let target = if var_scope == i64::from(scope::STACKTOP) {
                pop(world, frame, code, ip)?.to_real()? as i64
            } else {
                var_scope
            };
            read_array(world, frame, target, var.index, row, col, code, ip)
        }
    }
}

fn pop_variable(
    world: &mut World,
    frame: &mut Frame,
    instr: &Instr,
    var: SymbolRef,
    code: &str,
    ip: usize,
) -> Result<()> {
    check_var_index(world, var.index, code, ip)?;
    let var_scope = i64::from(instr.operand16);
    // In the swapped encoding the value was pushed before the target, so
    // the reference operands sit on top of it.
    let swapped = instr.type1 == DataType::Int32 && var.kind != RefKind::Normal;
    match var.kind {
        RefKind::Normal => {
            let value = pop(world, frame, code, ip)?;
            write_scoped(world, frame, var_scope, var.index, value, code, ip)
        }
        RefKind::StackTop => {
            let (target, value) = if swapped {
                let target = pop(world, frame, code, ip)?.to_real()? as i64;
                let value = pop(world, frame, code, ip)?;
                (target, value)
            } else {
                let value = pop(world, frame, code, ip)?;
                let target = pop(world, frame, code, ip)?.to_real()? as i64;
                (target, value)
            };
            write_scoped(world, frame, target, var.index, value, code, ip)
        }
        RefKind::Array => {
            let (target, index, value) = if swapped {
                let index = pop(world, frame, code, ip)?.to_i32()?;
                let target = if var_scope == i64::from(scope::STACKTOP) {
                    pop(world, frame, code, ip)?.to_real()? as i64
                } else {
                    var_scope
                };
                let value = pop(world, frame, code, ip)?;
                (target, index, value)
            } else {
                let value = pop(world, frame, code, ip)?;
                let index = pop(world, frame, code, ip)?.to_i32()?;
                let target = if var_scope == i64::from(scope::STACKTOP) {
                    pop(world, frame, code, ip)?.to_real()? as i64
                } else {
                    var_scope
                };
                (target, index, value)
            };
            if index < 0 {
                return Err(VmError::BadIndex {
                    code: code.to_owned(),
                    ip,
                }
                .into());
            }
            let (row, col) = split_index(index);
            write_array(world, frame, target, var.index, row, col, value, code, ip)
        }
    }
}

fn check_var_index(world: &World, index: u32, code: &str, ip: usize) -> Result<()> {
    if index as usize >= world.assets.variables.len() {
        return Err(VmError::BadRef {
            what: "variable",
            index: index as usize,
            code: code.to_owned(),
            ip,
        }
        .into());
    }
    Ok(())
}

fn var_name(world: &World, index: u32) -> String {
    world
        .assets
        .string(world.assets.variables[index as usize].name)
        .to_owned()
}

fn read_scoped(
    world: &mut World,
    frame: &Frame,
    target: i64,
    index: u32,
    code: &str,
    ip: usize,
) -> Result<Value> {
    match target {
        t if t == i64::from(scope::LOCAL) => Ok(frame
            .locals
            .get(&index)
            .cloned()
            .unwrap_or(Value::Undefined)),
        t if t == i64::from(scope::ARGUMENT) => {
            let slot = world.assets.variables[index as usize].var_id.max(0) as usize;
            Ok(frame.args.get(slot).cloned().unwrap_or(Value::Undefined))
        }
        t if t == i64::from(scope::GLOBAL) => Ok(world
            .globals
            .get(&index)
            .cloned()
            .unwrap_or(Value::Undefined)),
        t if t == i64::from(scope::BUILTIN) => {
            let name = var_name(world, index);
            if let Some(arg) = argument_slot(&name) {
                return Ok(frame.args.get(arg).cloned().unwrap_or(Value::Undefined));
            }
            if name == "argument_count" {
                return Ok(Value::Real(frame.args.len() as f64));
            }
            if world.var_builtins[index as usize].is_some() {
                return read_instance_var(world, frame, i64::from(scope::SELF), index, code, ip);
            }
            Ok(world.global_builtin_read(&name))
        }
        _ => read_instance_var(world, frame, target, index, code, ip),
    }
}

fn read_instance_var(
    world: &mut World,
    frame: &Frame,
    target: i64,
    index: u32,
    _code: &str,
    _ip: usize,
) -> Result<Value> {
    let assets = world.assets.clone();
    let Some(id) = target_instance(world, frame, target) else {
        let name = var_name(world, index);
        world.warn_limited(
            "variable",
            &name,
            &format!("read of {name} on missing instance {target}"),
        );
        return Ok(Value::Undefined);
    };
    let inst = &world.instances[&id];
    if let Some(bv) = world.var_builtins[index as usize] {
        return Ok(inst.builtin(bv, &assets));
    }
    Ok(inst.vars.get(&index).cloned().unwrap_or(Value::Undefined))
}

fn write_scoped(
    world: &mut World,
    frame: &mut Frame,
    target: i64,
    index: u32,
    value: Value,
    code: &str,
    ip: usize,
) -> Result<()> {
    match target {
        t if t == i64::from(scope::LOCAL) => {
            frame.locals.insert(index, value);
            Ok(())
        }
        t if t == i64::from(scope::ARGUMENT) => {
            let slot = world.assets.variables[index as usize].var_id.max(0) as usize;
            if slot < frame.args.len() {
                frame.args[slot] = value;
            }
            Ok(())
        }
        t if t == i64::from(scope::GLOBAL) => {
            world.globals.insert(index, value);
            Ok(())
        }
        t if t == i64::from(scope::BUILTIN) => {
            let name = var_name(world, index);
            if let Some(arg) = argument_slot(&name) {
                if arg < frame.args.len() {
                    frame.args[arg] = value;
                }
                return Ok(());
            }
            if world.var_builtins[index as usize].is_some() {
                return write_instance_var(world, frame, i64::from(scope::SELF), index, value, code, ip);
            }
            world.global_builtin_write(&name, &value)
        }
        _ => write_instance_var(world, frame, target, index, value, code, ip),
    }
}

fn write_instance_var(
    world: &mut World,
    frame: &Frame,
    target: i64,
    index: u32,
    value: Value,
    _code: &str,
    _ip: usize,
) -> Result<()> {
    let Some(id) = target_instance(world, frame, target) else {
        let name = var_name(world, index);
        world.warn_limited(
            "variable",
            &name,
            &format!("write of {name} on missing instance {target}"),
        );
        return Ok(());
    };
    let builtin = world.var_builtins[index as usize];
    let Some(inst) = world.instances.get_mut(&id) else {
        return Ok(());
    };
    if let Some(bv) = builtin {
        inst.set_builtin(bv, &value)?;
    } else {
        inst.vars.insert(index, value);
    }
    Ok(())
}

fn argument_slot(name: &str) -> Option<usize> {
    name.strip_prefix("argument")
        .and_then(|suffix| suffix.parse::<usize>().ok())
        .filter(|&n| n < 16)
}

/// Read one array cell. Scalars promote to cell (0, 0) the way the source
/// engine treats every variable as implicitly array shaped.
#[allow(clippy::too_many_arguments)]
fn read_array(
    world: &mut World,
    frame: &Frame,
    target: i64,
    index: u32,
    row: i32,
    col: i32,
    code: &str,
    ip: usize,
) -> Result<Value> {
    // Builtin array variables route to structured state.
    if let Some(value) = builtin_array_read(world, frame, target, index, row, col)? {
        return Ok(value);
    }
    let current = read_scoped(world, frame, target, index, code, ip)?;
    Ok(match current {
        Value::Array(a) => a.get(row, col),
        scalar if row == 0 && col == 0 => scalar,
        _ => Value::Undefined,
    })
}

#[allow(clippy::too_many_arguments)]
fn write_array(
    world: &mut World,
    frame: &mut Frame,
    target: i64,
    index: u32,
    row: i32,
    col: i32,
    value: Value,
    code: &str,
    ip: usize,
) -> Result<()> {
    if builtin_array_write(world, frame, target, index, row, col, &value)? {
        return Ok(());
    }
    let current = read_scoped(world, frame, target, index, code, ip)?;
    match current {
        Value::Array(a) => {
            a.set(row, col, value);
            Ok(())
        }
        old => {
            let array = GmArray::new();
            if !matches!(old, Value::Undefined) {
                array.set(0, 0, old);
            }
            array.set(row, col, value);
            write_scoped(world, frame, target, index, Value::Array(array), code, ip)
        }
    }
}

/// Alarm counters, view fields, and the argument vector look like arrays
/// to the bytecode but live in structured state.
fn builtin_array_read(
    world: &mut World,
    frame: &Frame,
    target: i64,
    index: u32,
    _row: i32,
    col: i32,
) -> Result<Option<Value>> {
    let name = var_name(world, index);
    if name == "alarm" {
        let Some(id) = target_instance(world, frame, effective_self(target)) else {
            return Ok(Some(Value::Undefined));
        };
        let k = col.clamp(0, 11) as usize;
        return Ok(Some(f64::from(world.instances[&id].alarms[k]).into()));
    }
    if name.starts_with("view_") {
        return Ok(Some(world.view_field(&name, col.max(0) as usize)));
    }
    if name == "argument" {
        return Ok(Some(
            frame
                .args
                .get(col.max(0) as usize)
                .cloned()
                .unwrap_or(Value::Undefined),
        ));
    }
    Ok(None)
}

#[allow(clippy::too_many_arguments)]
fn builtin_array_write(
    world: &mut World,
    frame: &mut Frame,
    target: i64,
    index: u32,
    _row: i32,
    col: i32,
    value: &Value,
) -> Result<bool> {
    let name = var_name(world, index);
    if name == "alarm" {
        let Some(id) = target_instance(world, frame, effective_self(target)) else {
            return Ok(true);
        };
        let k = col.clamp(0, 11) as usize;
        let v = value.to_i32()?;
        if let Some(inst) = world.instances.get_mut(&id) {
            inst.alarms[k] = v;
        }
        return Ok(true);
    }
    if name.starts_with("view_") {
        world.set_view_field(&name, col.max(0) as usize, value)?;
        return Ok(true);
    }
    if name == "argument" {
        let slot = col.max(0) as usize;
        if slot < frame.args.len() {
            frame.args[slot] = value.clone();
        }
        return Ok(true);
    }
    Ok(false)
}

/// Builtin scope reads of instance properties act on self.
fn effective_self(target: i64) -> i64 {
    if target == i64::from(scope::BUILTIN) {
        i64::from(scope::SELF)
    } else {
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamedata::testkit::{
        Asm, GameBuilder, REF_ARRAY, REF_NORMAL, SCOPE_GLOBAL, SCOPE_LOCAL, SCOPE_SELF,
    };
    use std::rc::Rc;

    fn world_with(b: GameBuilder) -> World {
        World::new(Rc::new(b.build().expect("synthetic game must load")), 7)
    }

    #[test]
    fn it_adds_and_returns() -> Result<()> {
        let mut b = GameBuilder::new();
        let mut asm = Asm::new();
        asm.push_i16(2).push_i16(3).add().ret();
        let code = b.code("calc", &asm);
        let mut world = world_with(b);
        let out = execute_code(&mut world, code, -4, -4, &[])?;
        assert_eq!(out.to_real()?, 5.0);
        assert!(world.stack.is_empty());
        Ok(())
    }

    #[test]
    fn conditional_branches_pop_their_condition() -> Result<()> {
        for (cond, expected) in [(0i16, 7.0), (1, 9.0)] {
            let mut b = GameBuilder::new();
            let mut asm = Asm::new();
            asm.push_i16(cond); // w0
            asm.bt(3); // w1 -> w4
            asm.push_i16(7); // w2
            asm.ret(); // w3
            asm.push_i16(9); // w4
            asm.ret(); // w5
            let code = b.code("branch", &asm);
            let mut world = world_with(b);
            let out = execute_code(&mut world, code, -4, -4, &[])?;
            assert_eq!(out.to_real()?, expected);
        }
        Ok(())
    }

    #[test]
    fn sparse_arrays_flatten_two_dimensions() -> Result<()> {
        // a[0,0] = 1; a[2,3] = 5; return a[2,3] + a[1,1]
        let mut b = GameBuilder::new();
        let a = b.variable("a", SCOPE_LOCAL);
        let mut asm = Asm::new();
        asm.push_d(0.0).push_i16(1).pop_var(scope::LOCAL, a, REF_ARRAY);
        asm.push_d(64003.0).push_i16(5).pop_var(scope::LOCAL, a, REF_ARRAY);
        asm.push_d(64003.0).push_var(scope::LOCAL, a, REF_ARRAY);
        asm.push_d(32001.0).push_var(scope::LOCAL, a, REF_ARRAY);
        asm.add().ret();
        let code = b.code("arrays", &asm);
        let mut world = world_with(b);
        let out = execute_code(&mut world, code, -4, -4, &[])?;
        assert_eq!(out.to_real()?, 5.0);
        Ok(())
    }

    #[test]
    fn builtin_properties_intercept_self_writes() -> Result<()> {
        let mut b = GameBuilder::new();
        let x = b.variable("x", SCOPE_SELF);
        let obj = b.object("obj_mover", -1, -1);
        let mut asm = Asm::new();
        asm.push_d(42.0).pop_var(scope::SELF, x, REF_NORMAL).exit();
        let code = b.code("set_x", &asm);
        let mut world = world_with(b);
        let id = world.create_instance(0.0, 0.0, obj, false);
        execute_code(&mut world, code, i64::from(id), i64::from(id), &[])?;
        assert_eq!(world.instances[&id].x, 42.0);
        assert!(world.instances[&id].vars.is_empty());
        Ok(())
    }

    #[test]
    fn scripts_receive_arguments_in_order() -> Result<()> {
        let mut b = GameBuilder::new();
        let arg0 = b.argument("argument0", 0);
        let mut body = Asm::with_args(1);
        body.push_var(scope::ARGUMENT, arg0, REF_NORMAL)
            .push_i16(2)
            .mul()
            .ret();
        let script_code = b.code("gml_Script_double", &body);
        b.script("double", script_code);
        let double = b.function("double");
        let mut caller = Asm::new();
        caller.push_i16(21).call(double, 1).ret();
        let code = b.code("caller", &caller);
        let mut world = world_with(b);
        let out = execute_code(&mut world, code, -4, -4, &[])?;
        assert_eq!(out.to_real()?, 42.0);
        Ok(())
    }

    #[test]
    fn builtin_calls_dispatch_by_name() -> Result<()> {
        let mut b = GameBuilder::new();
        let abs = b.function("abs");
        let mut asm = Asm::new();
        asm.push_d(-5.0).call(abs, 1).ret();
        let code = b.code("call_abs", &asm);
        let mut world = world_with(b);
        let out = execute_code(&mut world, code, -4, -4, &[])?;
        assert_eq!(out.to_real()?, 5.0);
        Ok(())
    }

    #[test]
    fn unknown_builtins_are_fatal_with_name() {
        let mut b = GameBuilder::new();
        let bogus = b.function("no_such_function_anywhere");
        let mut asm = Asm::new();
        asm.call(bogus, 0).ret();
        let code = b.code("call_bogus", &asm);
        let mut world = world_with(b);
        let err = execute_code(&mut world, code, -4, -4, &[]).unwrap_err();
        let vm = err.downcast_ref::<VmError>();
        assert!(matches!(vm, Some(VmError::UnknownBuiltin { name, .. })
            if name == "no_such_function_anywhere"));
    }

    #[test]
    fn with_redirects_self_over_every_instance() -> Result<()> {
        let mut b = GameBuilder::new();
        let x = b.variable("x", SCOPE_SELF);
        let obj = b.object("obj_thing", -1, -1);
        let mut asm = Asm::new();
        asm.push_i16(0); // w0: the object index
        asm.pushenv(7); // w1 -> w8 when empty/exhausted
        asm.push_d(5.0); // w2..w4
        asm.pop_var(scope::SELF, x, REF_NORMAL); // w5..w6
        asm.popenv(-5); // w7 -> w2
        asm.exit(); // w8
        let code = b.code("with_set", &asm);
        let mut world = world_with(b);
        let first = world.create_instance(1.0, 0.0, obj, false);
        let second = world.create_instance(2.0, 0.0, obj, false);
        execute_code(&mut world, code, -4, -4, &[])?;
        assert_eq!(world.instances[&first].x, 5.0);
        assert_eq!(world.instances[&second].x, 5.0);
        Ok(())
    }

    #[test]
    fn with_skips_instances_destroyed_mid_iteration() -> Result<()> {
        // with (all) { global.count += 1; instance_destroy(all); }
        let mut b = GameBuilder::new();
        let count = b.variable("count", SCOPE_GLOBAL);
        let destroy = b.function("instance_destroy");
        let obj = b.object("obj_victim", -1, -1);
        let mut asm = Asm::new();
        asm.push_i16(-3); // w0
        asm.pushenv(12); // w1 -> w13
        asm.push_var(scope::GLOBAL, count, REF_NORMAL); // w2..w3
        asm.push_i16(1); // w4
        asm.add(); // w5
        asm.pop_var(scope::GLOBAL, count, REF_NORMAL); // w6..w7
        asm.push_i16(-3); // w8
        asm.call(destroy, 1); // w9..w10
        asm.popz(); // w11
        asm.popenv(-10); // w12 -> w2
        asm.exit(); // w13
        let code = b.code("with_destroy", &asm);
        let mut world = world_with(b);
        for _ in 0..3 {
            world.create_instance(0.0, 0.0, obj, false);
        }
        execute_code(&mut world, code, -4, -4, &[])?;
        // The first visit destroyed the whole snapshot, so later targets
        // were skipped.
        assert_eq!(world.globals[&count].to_real()?, 1.0);
        assert_eq!(world.live_ids().len(), 0);
        Ok(())
    }

    #[test]
    fn division_by_zero_follows_source_sentinels() -> Result<()> {
        let mut b = GameBuilder::new();
        let mut asm = Asm::new();
        asm.push_d(3.0).push_d(0.0).div().ret();
        let code = b.code("divzero", &asm);
        let mut world = world_with(b);
        let out = execute_code(&mut world, code, -4, -4, &[])?;
        assert!(out.to_real()?.is_infinite());
        Ok(())
    }

    #[test]
    fn string_literals_come_from_the_table() -> Result<()> {
        let mut b = GameBuilder::new();
        let hello = b.intern("hello");
        let mut asm = Asm::new();
        asm.push_str(hello).ret();
        let code = b.code("strlit", &asm);
        let mut world = world_with(b);
        let out = execute_code(&mut world, code, -4, -4, &[])?;
        assert_eq!(out.to_display()?, "hello");
        Ok(())
    }

    #[test]
    fn stack_underflow_is_fatal() {
        let mut b = GameBuilder::new();
        let mut asm = Asm::new();
        asm.add().ret();
        let code = b.code("underflow", &asm);
        let mut world = world_with(b);
        let err = execute_code(&mut world, code, -4, -4, &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VmError>(),
            Some(VmError::StackUnderflow { .. })
        ));
    }
}
