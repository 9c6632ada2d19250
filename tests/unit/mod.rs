// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

mod config {
    mod settings_test;
}

mod utils {
    mod telemetry_test;
}
