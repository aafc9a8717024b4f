//! Two threads handing a ball back and forth with wait/notify
//!
//! The board is a [`Cell`] counting moves. Player `side` may move when
//! `moves % 2 == side`; otherwise it waits on the board's monitor.

use super::{class, int_arg, println, Cell, Program, CELL_CLASS};
use kiln_runtime::heap::{HeapLayout, ObjRef};
use kiln_runtime::thread::ThreadObject;
use kiln_runtime::types::{methods, ClassSpec, RegistryError, TypeRegistryBuilder};
use kiln_runtime::{Runtime, Throws};
use std::mem::offset_of;

pub const PROGRAM: Program = Program {
    name: "pingpong",
    summary: "two threads alternating through wait/notify [rounds]",
    main,
    register,
};

const PLAYER_CLASS: &str = "kiln.demo.PingPong$Player";

#[repr(C)]
struct Player {
    thread: ThreadObject,
    board: Option<ObjRef>,
    rounds: i32,
    side: i32,
}

// SAFETY: repr(C), starts with the thread layout, all-zero is valid.
unsafe impl HeapLayout for Player {}

fn register(types: &mut TypeRegistryBuilder) -> Result<(), RegistryError> {
    types.define_class(
        ClassSpec::new(PLAYER_CLASS, Player::SIZE)
            .extends("java.lang.Thread")
            .method(methods::RUN, run),
    )?;
    Ok(())
}

fn run(rt: &Runtime, this: ObjRef) -> Throws<()> {
    // SAFETY: run is only registered on PLAYER_CLASS.
    let player = unsafe { this.cast::<Player>() };
    let board = player.board;
    let side = i64::from(player.side);
    for _ in 0..player.rounds {
        rt.synchronized(board, || {
            let cell = rt.null_check(board)?;
            while Cell::get(cell) % 2 != side {
                rt.monitor_wait(board)?;
            }
            Cell::set(cell, Cell::get(cell) + 1);
            rt.monitor_notify(board)
        })?;
    }
    Ok(())
}

fn spawn(rt: &Runtime, board: ObjRef, rounds: i32, side: i32) -> Throws<ObjRef> {
    let player = rt.construct(class(rt, PLAYER_CLASS)?)?;
    // SAFETY: player is a fresh PLAYER_CLASS instance not yet shared.
    unsafe {
        player.write_field(offset_of!(Player, board), Some(board));
        player.write_field(offset_of!(Player, rounds), rounds);
        player.write_field(offset_of!(Player, side), side);
    }
    rt.thread_start(Some(player))?;
    Ok(player)
}

fn main(rt: &Runtime, args: ObjRef) -> Throws<()> {
    let rounds = int_arg(rt, args, 0, 1000)?.max(0);
    let board = rt.new_instance(class(rt, CELL_CLASS)?)?;

    let start = rt.current_time_millis();
    let pong = spawn(rt, board, rounds, 1)?;
    let ping = spawn(rt, board, rounds, 0)?;
    rt.thread_join(Some(ping))?;
    rt.thread_join(Some(pong))?;
    let elapsed = rt.current_time_millis() - start;

    let moves = rt.synchronized(Some(board), || Ok(Cell::get(board)))?;
    println(rt, &format!("{} moves in {} ms", moves, elapsed))
}
