mod time;
mod times;
