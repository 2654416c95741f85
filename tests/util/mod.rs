#![allow(dead_code)]

use rand::{Rng, distr::Alphanumeric};

pub fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
