mod support;

mod backoff;
mod capture;
mod link;
mod packing;
mod ring;
