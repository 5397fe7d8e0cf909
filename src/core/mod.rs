//=========================================================================
// Core Systems
//
// Building blocks of the orchestration engine.
//
// Layers (bottom-up):
// - host       external scene capability the engine drives
// - action     resumable units of work and their composition
// - operation  caller-facing handle around a root action
// - scene      scene bookkeeping and ready-made scene workflows
// - scheduler  lanes, queues and the cooperative tick loop
//
// Notes:
// Everything here runs on the thread that calls `Scheduler::tick`.
// Only lifecycle events leave that thread, through crossbeam channels.
//
//=========================================================================

pub mod action;
pub mod host;
pub mod operation;
pub mod scene;
pub mod scheduler;
