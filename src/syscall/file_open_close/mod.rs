mod close;
mod creat;
mod open;
