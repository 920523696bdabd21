mod access;
mod chmod;
mod umask;
