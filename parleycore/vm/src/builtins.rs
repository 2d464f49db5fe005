//! Default operator and container-command builtins
use std::cmp::Ordering;
use std::rc::Rc;

use parley_bytecode::Value;
use parley_common::{RunResult, RuntimeError};

use crate::RunContext;

/// Equality falls back from integers to doubles with this tolerance before
/// comparing as strings.
const EQUALITY_TOLERANCE: f64 = 1e-5;

pub(crate) fn register_defaults(ctx: &mut RunContext) {
    let functions: &[(&str, fn(&[Value], &mut RunContext) -> RunResult<()>)] = &[
        ("+", builtin_plus),
        ("-", builtin_minus),
        ("*", builtin_times),
        ("/", builtin_divide),
        ("<", builtin_less),
        (">", builtin_greater),
        ("<=", builtin_less_equal),
        (">=", builtin_greater_equal),
        ("=", builtin_equal),
        ("≠", builtin_not_equal),
        ("&", builtin_concat),
        ("&&", builtin_concat_space),
    ];
    for (name, f) in functions {
        ctx.builtin_functions.insert((*name).to_string(), Rc::new(*f));
    }
    let commands: &[(&str, fn(&[Value], &mut RunContext) -> RunResult<()>)] = &[
        ("put", builtin_put),
        ("add", builtin_add),
        ("subtract", builtin_subtract),
    ];
    for (name, f) in commands {
        ctx.builtin_commands.insert((*name).to_string(), Rc::new(*f));
    }
}

fn two_args(args: &[Value]) -> RunResult<(&Value, &Value)> {
    match args.len() {
        0 | 1 => Err(RuntimeError::TooFewOperands),
        2 => Ok((&args[0], &args[1])),
        _ => Err(RuntimeError::TooManyOperands),
    }
}

/// Both operands as integers when they coerce, both as doubles otherwise.
enum NumberPair {
    Integers(i64, i64),
    Doubles(f64, f64),
}

fn number_pair(a: &Value, b: &Value, stack: &[Value]) -> RunResult<NumberPair> {
    if let (Ok(x), Ok(y)) = (a.as_integer(stack), b.as_integer(stack)) {
        return Ok(NumberPair::Integers(x, y));
    }
    Ok(NumberPair::Doubles(a.as_double(stack)?, b.as_double(stack)?))
}

// Strict numeric readings for comparison and equality: unlike the coercion
// table, a malformed string is not zero here, it forces the string fallback.
fn strict_integer(v: &Value, stack: &[Value]) -> RunResult<Option<i64>> {
    let v = v.resolved(stack)?;
    Ok(match v {
        Value::Integer(i) => Some(i),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

fn strict_double(v: &Value, stack: &[Value]) -> RunResult<Option<f64>> {
    let v = v.resolved(stack)?;
    Ok(match v {
        Value::Integer(i) => Some(i as f64),
        Value::Double(d) => Some(d),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn push_arithmetic(
    args: &[Value],
    ctx: &mut RunContext,
    ints: fn(i64, i64) -> Option<i64>,
    doubles: fn(f64, f64) -> f64,
) -> RunResult<()> {
    let (a, b) = two_args(args)?;
    let value = match number_pair(a, b, &ctx.stack)? {
        NumberPair::Integers(x, y) => match ints(x, y) {
            Some(v) => Value::Integer(v),
            // spill to doubles on overflow
            None => Value::Double(doubles(x as f64, y as f64)),
        },
        NumberPair::Doubles(x, y) => Value::Double(doubles(x, y)),
    };
    ctx.stack.push(value);
    Ok(())
}

fn builtin_plus(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    push_arithmetic(args, ctx, i64::checked_add, |x, y| x + y)
}

fn builtin_minus(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    push_arithmetic(args, ctx, i64::checked_sub, |x, y| x - y)
}

fn builtin_times(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    push_arithmetic(args, ctx, i64::checked_mul, |x, y| x * y)
}

fn builtin_divide(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    let (a, b) = two_args(args)?;
    let value = match number_pair(a, b, &ctx.stack)? {
        NumberPair::Integers(_, 0) => return Err(RuntimeError::ZeroDivision),
        NumberPair::Integers(x, y) => {
            if x % y == 0 { Value::Integer(x / y) } else { Value::Double(x as f64 / y as f64) }
        }
        NumberPair::Doubles(_, y) if y == 0.0 => return Err(RuntimeError::ZeroDivision),
        NumberPair::Doubles(x, y) => Value::Double(x / y),
    };
    ctx.stack.push(value);
    Ok(())
}

/// Integers when both sides read as integers, doubles when both read as
/// numbers, string ordering otherwise.
fn compare_values(a: &Value, b: &Value, stack: &[Value]) -> RunResult<Ordering> {
    if let (Some(x), Some(y)) = (strict_integer(a, stack)?, strict_integer(b, stack)?) {
        return Ok(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (strict_double(a, stack)?, strict_double(b, stack)?) {
        return Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal));
    }
    Ok(a.as_string(stack)?.cmp(&b.as_string(stack)?))
}

fn push_comparison(args: &[Value], ctx: &mut RunContext, accept: fn(Ordering) -> bool) -> RunResult<()> {
    let (a, b) = two_args(args)?;
    let ordering = compare_values(a, b, &ctx.stack)?;
    ctx.stack.push(Value::Boolean(accept(ordering)));
    Ok(())
}

fn builtin_less(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    push_comparison(args, ctx, Ordering::is_lt)
}

fn builtin_greater(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    push_comparison(args, ctx, Ordering::is_gt)
}

fn builtin_less_equal(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    push_comparison(args, ctx, Ordering::is_le)
}

fn builtin_greater_equal(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    push_comparison(args, ctx, Ordering::is_ge)
}

/// Integer equality, then double equality within tolerance, then string
/// equality.
fn values_equal(a: &Value, b: &Value, stack: &[Value]) -> RunResult<bool> {
    if let (Some(x), Some(y)) = (strict_integer(a, stack)?, strict_integer(b, stack)?) {
        return Ok(x == y);
    }
    if let (Some(x), Some(y)) = (strict_double(a, stack)?, strict_double(b, stack)?) {
        return Ok((x - y).abs() < EQUALITY_TOLERANCE);
    }
    Ok(a.as_string(stack)? == b.as_string(stack)?)
}

fn builtin_equal(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    let (a, b) = two_args(args)?;
    let equal = values_equal(a, b, &ctx.stack)?;
    ctx.stack.push(Value::Boolean(equal));
    Ok(())
}

fn builtin_not_equal(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    let (a, b) = two_args(args)?;
    let equal = values_equal(a, b, &ctx.stack)?;
    ctx.stack.push(Value::Boolean(!equal));
    Ok(())
}

fn builtin_concat(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    let (a, b) = two_args(args)?;
    let text = format!("{}{}", a.as_string(&ctx.stack)?, b.as_string(&ctx.stack)?);
    ctx.stack.push(Value::from(text));
    Ok(())
}

fn builtin_concat_space(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    let (a, b) = two_args(args)?;
    let text = format!("{} {}", a.as_string(&ctx.stack)?, b.as_string(&ctx.stack)?);
    ctx.stack.push(Value::from(text));
    Ok(())
}

fn destination_index(destination: &Value, ctx: &RunContext) -> RunResult<usize> {
    let index = destination
        .reference_index(&ctx.stack)
        .ok_or(RuntimeError::InvalidPutDestination)?;
    if index >= ctx.stack.len() {
        return Err(RuntimeError::StackIndexOutOfRange);
    }
    Ok(index)
}

fn builtin_put(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    let (value, destination) = two_args(args)?;
    let index = destination_index(destination, ctx)?;
    let concrete = value.resolved(&ctx.stack)?;
    ctx.stack[index] = concrete;
    Ok(())
}

fn builtin_add(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    let (value, destination) = two_args(args)?;
    let index = destination_index(destination, ctx)?;
    let current = ctx.stack[index].clone();
    let sum = match number_pair(&current, value, &ctx.stack)? {
        NumberPair::Integers(x, y) => match x.checked_add(y) {
            Some(v) => Value::Integer(v),
            None => Value::Double(x as f64 + y as f64),
        },
        NumberPair::Doubles(x, y) => Value::Double(x + y),
    };
    ctx.stack[index] = sum;
    Ok(())
}

fn builtin_subtract(args: &[Value], ctx: &mut RunContext) -> RunResult<()> {
    let (value, destination) = two_args(args)?;
    let index = destination_index(destination, ctx)?;
    let current = ctx.stack[index].clone();
    let difference = match number_pair(&current, value, &ctx.stack)? {
        NumberPair::Integers(x, y) => match x.checked_sub(y) {
            Some(v) => Value::Integer(v),
            None => Value::Double(x as f64 - y as f64),
        },
        NumberPair::Doubles(x, y) => Value::Double(x - y),
    };
    ctx.stack[index] = difference;
    Ok(())
}
