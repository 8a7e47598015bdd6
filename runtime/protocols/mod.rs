/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Scheme request routing: registration, dispatch and response translation.

pub mod error;
pub mod request;
pub mod responder;
pub mod response;
pub mod router;
pub mod service;
pub mod stream;
pub(crate) mod translate;
pub mod upstream;
