mod assertions;
mod exec;
mod explain;
mod session;
