//! Print the arguments separated by spaces

use super::{no_classes, print, Program};
use kiln_runtime::heap::ObjRef;
use kiln_runtime::{Runtime, Throws};

pub const PROGRAM: Program = Program {
    name: "echo",
    summary: "print the arguments separated by spaces",
    main,
    register: no_classes,
};

fn main(rt: &Runtime, args: ObjRef) -> Throws<()> {
    let count = rt.array_length(Some(args))?;
    for i in 0..count {
        if i > 0 {
            rt.write_unit(i32::from(b' '));
        }
        print(rt, rt.array_load(Some(args), i)?)?;
    }
    rt.write_unit(i32::from(b'\n'));
    Ok(())
}
