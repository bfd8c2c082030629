// Life of a request:
// 1. Socket bytes arrive at the multiplexer's read buffer
// 2. The protocol decoder turns one frame into an argument vector
// 3. The command dispatch boundary hands it to the command layer
// 4. The command layer runs hierarchical get/set/delete operations
//    against the ordered index
// 5. The reply buffer (if any) is written back to the socket
//
// System components:
//  - Ordered index (red-black tree) and key/value codec
//  - Wire protocol decoder/encoder
//  - Single-threaded connection multiplexer
//  - Command dispatch boundary

pub mod config;
pub mod constants;
pub mod dispatch;
mod e2e_tests;
pub mod protocol;
pub mod server;
pub mod stats;
pub mod storage;

pub use dispatch::{CommandHandler, HashCommands, LifecycleKind};
pub use server::{Server, ServerError};
