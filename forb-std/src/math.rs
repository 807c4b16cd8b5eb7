//! Expression constants and functions

use dashu_int::IBig;
use forb_plugin::prelude::*;

pub struct Pi;
pub struct Euler;
pub struct Phi;
pub struct Tau;

pub struct Factorial;
pub struct Fib;
pub struct Gcd;
pub struct Lcm;
pub struct IsPrime;
pub struct Sqrt;
pub struct Log;
pub struct Log10;
pub struct Sin;
pub struct Cos;
pub struct Tan;

/// Largest n accepted by factorial(); n! beyond this has ~36k digits.
const MAX_FACTORIAL: i64 = 10_000;
const MAX_FIB: i64 = 100_000;

// ============================================================================
// Constants
// ============================================================================

impl ExprVarPlugin for Pi {
    fn meta(&self) -> ExprVarMeta {
        ExprVarMeta::new("PI", "Pi - ratio of circumference to diameter")
    }

    fn value(&self, ctx: &EvalContext) -> Result<Number, ForbError> {
        Ok(Number::pi(ctx.precision))
    }
}

impl ExprVarPlugin for Euler {
    fn meta(&self) -> ExprVarMeta {
        ExprVarMeta::new("E", "Euler's number - base of natural logarithm")
    }

    fn value(&self, ctx: &EvalContext) -> Result<Number, ForbError> {
        Ok(Number::e(ctx.precision))
    }
}

impl ExprVarPlugin for Phi {
    fn meta(&self) -> ExprVarMeta {
        ExprVarMeta::new("PHI", "Golden ratio - (1 + sqrt(5)) / 2")
    }

    fn value(&self, ctx: &EvalContext) -> Result<Number, ForbError> {
        Ok(Number::phi(ctx.precision))
    }
}

impl ExprVarPlugin for Tau {
    fn meta(&self) -> ExprVarMeta {
        ExprVarMeta::new("TAU", "Tau - 2 * PI (full circle in radians)")
    }

    fn value(&self, ctx: &EvalContext) -> Result<Number, ForbError> {
        Ok(Number::tau(ctx.precision))
    }
}

// ============================================================================
// Integer functions
// ============================================================================

fn one<'a>(name: &str, args: &'a [Number]) -> Result<&'a Number, ForbError> {
    match args {
        [x] => Ok(x),
        _ => Err(ForbError::arity_mismatch(name, 1, args.len())),
    }
}

fn two<'a>(name: &str, args: &'a [Number]) -> Result<(&'a Number, &'a Number), ForbError> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(ForbError::arity_mismatch(name, 2, args.len())),
    }
}

/// Integer view of an already-truncated argument
fn integer(name: &str, n: &Number) -> Result<IBig, ForbError> {
    n.trunc()
        .to_ibig()
        .ok_or_else(|| ForbError::domain_error(format!("{}() requires an integer", name)))
}

fn small_integer(name: &str, n: &Number) -> Result<i64, ForbError> {
    n.trunc()
        .to_i64()
        .ok_or_else(|| ForbError::overflow(format!("{}() argument is out of range", name)))
}

fn gcd_ibig(a: IBig, b: IBig) -> IBig {
    let (mut a, mut b) = (abs(a), abs(b));
    while b != IBig::ZERO {
        let r = &a % &b;
        a = b;
        b = r;
    }
    a
}

fn abs(n: IBig) -> IBig {
    if n < IBig::ZERO {
        -n
    } else {
        n
    }
}

impl ExprFuncPlugin for Factorial {
    fn meta(&self) -> ExprFuncMeta {
        ExprFuncMeta::new(
            "factorial",
            "Calculate n!",
            vec![ArgMeta::truncated("n", "Non-negative integer")],
        )
    }

    fn call(&self, args: &[Number], _ctx: &EvalContext) -> Result<Number, ForbError> {
        let n = small_integer("factorial", one("factorial", args)?)?;
        if n < 0 {
            return Err(ForbError::domain_error("factorial() is not defined for negative numbers"));
        }
        if n > MAX_FACTORIAL {
            return Err(ForbError::overflow(format!("factorial() accepts n <= {}", MAX_FACTORIAL)));
        }
        let mut acc = IBig::ONE;
        for k in 2..=n {
            acc *= IBig::from(k);
        }
        Ok(Number::from_ibig(acc))
    }
}

impl ExprFuncPlugin for Fib {
    fn meta(&self) -> ExprFuncMeta {
        ExprFuncMeta::new(
            "fib",
            "Fibonacci number at position n",
            vec![ArgMeta::truncated("n", "Non-negative position")],
        )
    }

    fn call(&self, args: &[Number], _ctx: &EvalContext) -> Result<Number, ForbError> {
        let n = small_integer("fib", one("fib", args)?)?;
        if n < 0 {
            return Err(ForbError::domain_error("fib() is not defined for negative positions"));
        }
        if n > MAX_FIB {
            return Err(ForbError::overflow(format!("fib() accepts n <= {}", MAX_FIB)));
        }
        let (mut a, mut b) = (IBig::ZERO, IBig::ONE);
        for _ in 0..n {
            let next = &a + &b;
            a = b;
            b = next;
        }
        Ok(Number::from_ibig(a))
    }
}

impl ExprFuncPlugin for Gcd {
    fn meta(&self) -> ExprFuncMeta {
        ExprFuncMeta::new(
            "gcd",
            "Greatest common divisor of two numbers",
            vec![ArgMeta::truncated("a", "First integer"), ArgMeta::truncated("b", "Second integer")],
        )
    }

    fn call(&self, args: &[Number], _ctx: &EvalContext) -> Result<Number, ForbError> {
        let (a, b) = two("gcd", args)?;
        Ok(Number::from_ibig(gcd_ibig(integer("gcd", a)?, integer("gcd", b)?)))
    }
}

impl ExprFuncPlugin for Lcm {
    fn meta(&self) -> ExprFuncMeta {
        ExprFuncMeta::new(
            "lcm",
            "Least common multiple of two numbers",
            vec![ArgMeta::truncated("a", "First integer"), ArgMeta::truncated("b", "Second integer")],
        )
    }

    fn call(&self, args: &[Number], _ctx: &EvalContext) -> Result<Number, ForbError> {
        let (a, b) = two("lcm", args)?;
        let (a, b) = (integer("lcm", a)?, integer("lcm", b)?);
        if a == IBig::ZERO || b == IBig::ZERO {
            return Ok(Number::from_i64(0));
        }
        let g = gcd_ibig(a.clone(), b.clone());
        Ok(Number::from_ibig(abs(a * b) / g))
    }
}

impl IsPrime {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

    fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
        ((a as u128 * b as u128) % m as u128) as u64
    }

    fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
        let mut result = 1;
        base %= m;
        while exp > 0 {
            if exp & 1 == 1 {
                result = Self::mul_mod(result, base, m);
            }
            base = Self::mul_mod(base, base, m);
            exp >>= 1;
        }
        result
    }

    /// Deterministic Miller-Rabin for all 64-bit inputs
    fn is_prime(n: u64) -> bool {
        if n < 2 {
            return false;
        }
        for p in Self::WITNESSES {
            if n % p == 0 {
                return n == p;
            }
        }
        let (mut d, mut s) = (n - 1, 0);
        while d % 2 == 0 {
            d /= 2;
            s += 1;
        }
        'witness: for a in Self::WITNESSES {
            let mut x = Self::pow_mod(a, d, n);
            if x == 1 || x == n - 1 {
                continue;
            }
            for _ in 1..s {
                x = Self::mul_mod(x, x, n);
                if x == n - 1 {
                    continue 'witness;
                }
            }
            return false;
        }
        true
    }
}

impl ExprFuncPlugin for IsPrime {
    fn meta(&self) -> ExprFuncMeta {
        ExprFuncMeta::new(
            "isPrime",
            "Check if n is prime (returns 1 or 0)",
            vec![ArgMeta::truncated("n", "Integer to test")],
        )
    }

    fn call(&self, args: &[Number], _ctx: &EvalContext) -> Result<Number, ForbError> {
        let n = small_integer("isPrime", one("isPrime", args)?)?;
        let prime = u64::try_from(n).map(Self::is_prime).unwrap_or(false);
        Ok(Number::from_i64(prime as i64))
    }
}

// ============================================================================
// Real functions
// ============================================================================

impl ExprFuncPlugin for Sqrt {
    fn meta(&self) -> ExprFuncMeta {
        ExprFuncMeta::new("sqrt", "Square root", vec![ArgMeta::real("x", "Value (must be non-negative)")])
    }

    fn call(&self, args: &[Number], ctx: &EvalContext) -> Result<Number, ForbError> {
        Ok(one("sqrt", args)?.sqrt(ctx.precision)?)
    }
}

impl ExprFuncPlugin for Log {
    fn meta(&self) -> ExprFuncMeta {
        ExprFuncMeta::new("log", "Natural logarithm", vec![ArgMeta::real("x", "Value (must be positive)")])
    }

    fn call(&self, args: &[Number], ctx: &EvalContext) -> Result<Number, ForbError> {
        Ok(one("log", args)?.ln(ctx.precision)?)
    }
}

impl ExprFuncPlugin for Log10 {
    fn meta(&self) -> ExprFuncMeta {
        ExprFuncMeta::new("log10", "Base-10 logarithm", vec![ArgMeta::real("x", "Value (must be positive)")])
    }

    fn call(&self, args: &[Number], ctx: &EvalContext) -> Result<Number, ForbError> {
        Ok(one("log10", args)?.log10(ctx.precision)?)
    }
}

impl ExprFuncPlugin for Sin {
    fn meta(&self) -> ExprFuncMeta {
        ExprFuncMeta::new("sin", "Sine (radians)", vec![ArgMeta::real("x", "Angle in radians")])
    }

    fn call(&self, args: &[Number], ctx: &EvalContext) -> Result<Number, ForbError> {
        Ok(one("sin", args)?.sin(ctx.precision))
    }
}

impl ExprFuncPlugin for Cos {
    fn meta(&self) -> ExprFuncMeta {
        ExprFuncMeta::new("cos", "Cosine (radians)", vec![ArgMeta::real("x", "Angle in radians")])
    }

    fn call(&self, args: &[Number], ctx: &EvalContext) -> Result<Number, ForbError> {
        Ok(one("cos", args)?.cos(ctx.precision))
    }
}

impl ExprFuncPlugin for Tan {
    fn meta(&self) -> ExprFuncMeta {
        ExprFuncMeta::new("tan", "Tangent (radians)", vec![ArgMeta::real("x", "Angle in radians")])
    }

    fn call(&self, args: &[Number], ctx: &EvalContext) -> Result<Number, ForbError> {
        Ok(one("tan", args)?.tan(ctx.precision)?)
    }
}
