// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EphemeralDatabaseSetupError {
    #[error("{0}")]
    Generic(String),

    #[error("Executable not found: {0}")]
    ExecutableNotFound(#[from] which::Error),

    #[error("Failed to start Docker: {0}")]
    Docker(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
