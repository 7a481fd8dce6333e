// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide shared connection slot.
//!
//! An embedding application that already owns an open [`Bus`](crate::Bus)
//! can install it here; a later `ProcessContext` initialization discovers
//! and adopts it without taking ownership. Adopted connections are never
//! closed by the adopter.

use crate::Bus;
use parking_lot::Mutex;
use std::sync::Arc;

static SHARED: Mutex<Option<Arc<Bus>>> = Mutex::new(None);

/// Make an already-open connection discoverable process-wide.
pub fn install(bus: Arc<Bus>) {
    *SHARED.lock() = Some(bus);
}

/// Return the installed connection, if any.
pub fn discover() -> Option<Arc<Bus>> {
    SHARED.lock().clone()
}

/// Remove the installed connection. The connection itself stays open.
pub fn clear() {
    *SHARED.lock() = None;
}
