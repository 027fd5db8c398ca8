pub mod control;
pub mod data_channel;
pub mod network;

pub use control::ControlChannel;
pub use data_channel::{
    DataChannelAcceptor, DataChannelInitiator, FixedPortAcceptor, FixedPortInitiator,
    PendingDataChannel,
};
