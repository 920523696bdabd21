mod brk;
