//! Ports - 抽象化レイヤー
//!
//! Traits for everything the engine consumes from the outside: the platform
//! SDK's channel client, the printer, the random source and id allocation.
//! The coordinator receives all of them at construction; nothing in the
//! core reaches for global state.

pub mod client;
pub mod id_generator;
pub mod printer;
pub mod random;

pub use self::client::{
    ChannelClient, ClientError, EndorsementHandler, ExecuteOptions, Peer, ProposalResponse,
    Request, Response,
};
pub use self::id_generator::{IdGenerator, SequentialIdGenerator};
pub use self::printer::Printer;
pub use self::random::RandomSource;
