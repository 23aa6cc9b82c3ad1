pub mod command;
pub mod discovery;
pub mod fragment;
pub mod framer;
pub mod packet;
pub mod session;
pub mod xml;
