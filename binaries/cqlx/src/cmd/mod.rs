mod cat;
mod error;
mod export;


pub use {
    cat::cat,
    error::Error,
    export::export,
};
