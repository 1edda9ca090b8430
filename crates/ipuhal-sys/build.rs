// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

// Plugins are bound at runtime through libloading, nothing is linked here.

fn main() {
    // The repr(C) types in src/lib.rs track this header by hand.
    println!("cargo:rerun-if-changed=../../include/custom_aic.h");
}
