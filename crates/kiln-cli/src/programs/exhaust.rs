//! Allocate until the arena runs out
//!
//! Keeps every block reachable through a linked chain so nothing could be
//! reclaimed even by a collecting heap, then lets the out-of-memory fault
//! escape `main`.

use super::{int_arg, Program};
use kiln_runtime::heap::ObjRef;
use kiln_runtime::{Runtime, Throws};

pub const PROGRAM: Program = Program {
    name: "exhaust",
    summary: "allocate until out of memory [block-length]",
    main,
    register: super::no_classes,
};

fn main(rt: &Runtime, args: ObjRef) -> Throws<()> {
    let block_length = int_arg(rt, args, 0, 1024)?;
    let mut chain: Option<ObjRef> = None;
    loop {
        // Object[2]: [0] = previous link, [1] = payload
        let link = rt.new_array(rt.builtins().object_array, 2)?;
        let payload = rt.new_array(rt.builtins().long_array, block_length)?;
        rt.array_store(Some(link), 0, chain)?;
        rt.array_store(Some(link), 1, Some(payload))?;
        chain = Some(link);
    }
}
