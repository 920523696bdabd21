mod stat;
