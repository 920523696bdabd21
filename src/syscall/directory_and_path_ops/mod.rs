mod chdir;
mod link;
mod mkdir;
