//! Network and pipeline topology planning — CIDR math, transit routing,
//! artifact threading.

pub mod cidr;
pub mod network;
pub mod pipeline;
