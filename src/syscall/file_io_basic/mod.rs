mod dup;
mod lseek;
mod pipe;
mod read;
mod write;
