//! One module per transport back-end, mirroring
//! `original_source/IOChannel{File,Fd,MemMapFd,Tcp,Socket,StdIn,StdOut,
//! StdErr,Null,Calc}.c`.

pub mod calc;
pub mod fd;
pub mod file;
pub mod mem;
pub mod mmap;
pub mod null;
pub mod stdio;
pub mod tcp;
pub mod udp;
