//! Threads incrementing a shared counter under its monitor
//!
//! ```java
//! class Worker extends Thread {
//!     Cell counter; int increments;
//!     public void run() {
//!         for (int i = 0; i < increments; i++)
//!             synchronized (counter) { counter.value++; }
//!     }
//! }
//! ```

use super::{class, int_arg, println, Cell, Program, CELL_CLASS};
use kiln_runtime::heap::{HeapLayout, ObjRef};
use kiln_runtime::thread::ThreadObject;
use kiln_runtime::types::{methods, ClassSpec, RegistryError, TypeRegistryBuilder};
use kiln_runtime::{Runtime, Throws};
use std::mem::offset_of;

pub const PROGRAM: Program = Program {
    name: "counter",
    summary: "threads incrementing a shared counter [threads] [increments]",
    main,
    register,
};

const WORKER_CLASS: &str = "kiln.demo.Counter$Worker";
const THREAD_ARRAY_CLASS: &str = "java.lang.Thread[]";

#[repr(C)]
struct Worker {
    thread: ThreadObject,
    counter: Option<ObjRef>,
    increments: i32,
}

// SAFETY: repr(C), starts with the thread layout, all-zero is valid.
unsafe impl HeapLayout for Worker {}

fn register(types: &mut TypeRegistryBuilder) -> Result<(), RegistryError> {
    types.define_class(
        ClassSpec::new(WORKER_CLASS, Worker::SIZE)
            .extends("java.lang.Thread")
            .method(methods::RUN, run),
    )?;
    types.define_array("java.lang.Thread")?;
    Ok(())
}

fn run(rt: &Runtime, this: ObjRef) -> Throws<()> {
    // SAFETY: run is only registered on WORKER_CLASS.
    let worker = unsafe { this.cast::<Worker>() };
    let counter = worker.counter;
    for _ in 0..worker.increments {
        rt.synchronized(counter, || {
            let cell = rt.null_check(counter)?;
            Cell::set(cell, Cell::get(cell) + 1);
            Ok(())
        })?;
    }
    Ok(())
}

fn main(rt: &Runtime, args: ObjRef) -> Throws<()> {
    let threads = int_arg(rt, args, 0, num_cpus::get() as i32)?.max(0);
    let increments = int_arg(rt, args, 1, 10_000)?.max(0);

    let counter = rt.new_instance(class(rt, CELL_CLASS)?)?;
    let worker_class = class(rt, WORKER_CLASS)?;
    let workers = rt.new_array(class(rt, THREAD_ARRAY_CLASS)?, threads)?;

    for i in 0..threads {
        let worker = rt.construct(worker_class)?;
        // SAFETY: worker is a fresh WORKER_CLASS instance not yet shared.
        unsafe {
            worker.write_field(offset_of!(Worker, counter), Some(counter));
            worker.write_field(offset_of!(Worker, increments), increments);
        }
        rt.array_store(Some(workers), i, Some(worker))?;
    }
    for i in 0..threads {
        rt.thread_start(rt.array_load(Some(workers), i)?)?;
    }
    for i in 0..threads {
        rt.thread_join(rt.array_load(Some(workers), i)?)?;
    }

    let total = rt.synchronized(Some(counter), || Ok(Cell::get(counter)))?;
    println(
        rt,
        &format!("{} threads x {} increments = {}", threads, increments, total),
    )
}
