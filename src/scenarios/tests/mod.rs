mod io;
mod polling;
