// Copyright 2022, The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Automatic reconnection of a paired audio accessory.
//!
//! Whenever the adapter powers on or a profile proxy becomes available, the
//! [`connection::Orchestrator`] looks for a bonded audio device, dials it over
//! the call and media profiles, waits for the platform to confirm the
//! handshake and retries a bounded number of times. Everything platform
//! specific (radio stack, permissions, notifications) sits behind the traits
//! in [`profile`] and [`connection::orchestrator`].

#[macro_use]
extern crate num_derive;

pub mod config;
pub mod connection;
pub mod core;
pub mod logging;
pub mod profile;
pub mod utils;
