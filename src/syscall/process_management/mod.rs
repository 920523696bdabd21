mod exec;
mod fork;
mod getpid;
mod kill;
mod wait;
