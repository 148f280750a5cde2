mod analyzer;
mod downstream;
mod solver;
