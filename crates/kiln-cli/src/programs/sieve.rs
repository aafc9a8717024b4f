//! Sieve of Eratosthenes over a `boolean[]`
//!
//! Exercises the bounds-checked array paths in a tight loop and reports the
//! best wall-clock time over several passes.

use super::{int_arg, println, Program};
use kiln_runtime::heap::ObjRef;
use kiln_runtime::{Runtime, Throws};

pub const PROGRAM: Program = Program {
    name: "sieve",
    summary: "count primes with a sieve [limit] [passes]",
    main,
    register: super::no_classes,
};

fn main(rt: &Runtime, args: ObjRef) -> Throws<()> {
    let limit = int_arg(rt, args, 0, 100_000)?;
    let passes = int_arg(rt, args, 1, 5)?.max(1);

    let mut count = 0;
    let mut best = i64::MAX;
    for _ in 0..passes {
        let start = rt.current_time_millis();
        count = sieve(rt, limit)?;
        best = best.min(rt.current_time_millis() - start);
    }

    println(rt, &format!("primes below {}: {}", limit, count))?;
    println(rt, &format!("best of {} passes: {} ms", passes, best))
}

/// Number of primes in `0..limit`
fn sieve(rt: &Runtime, limit: i32) -> Throws<i32> {
    let composite = rt.new_array(rt.builtins().boolean_array, limit.max(0))?;
    let mut count = 0;
    for i in 2..limit {
        if rt.array_load::<bool>(Some(composite), i)? {
            continue;
        }
        count += 1;
        let mut multiple = i64::from(i) * i64::from(i);
        while multiple < i64::from(limit) {
            rt.array_store(Some(composite), multiple as i32, true)?;
            multiple += i64::from(i);
        }
    }
    Ok(count)
}
