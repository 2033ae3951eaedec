mod option;
mod scalars;
mod string;
mod tuple;
mod vector;
