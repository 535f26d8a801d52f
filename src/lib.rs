pub mod backend;
pub mod debounce;
pub mod filter;
pub mod fs;
pub mod git;
pub mod notice;
pub mod patch;
pub mod path;
pub mod poller;
pub mod reconcile;
pub mod search;
pub mod selection;
pub mod session;
pub mod tree;
pub mod util;
