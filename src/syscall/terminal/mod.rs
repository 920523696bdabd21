mod isatty;
