// Copyright 2025 coScene
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

// Export sink module
//
// Provides a trait-based abstraction for where finished trip files go:
// a local directory, or a local directory plus a share tool.
//
// Sinks are WRITE-ONLY. Reading trips back is done with the exporter's
// CSV parser or any CSV tool.

pub mod backend;
pub mod factory;
pub mod filesystem;
pub mod share;

pub use backend::ExportSink;
pub use factory::SinkFactory;
pub use filesystem::FilesystemSink;
pub use share::ShareSink;
