mod client;
mod request;
mod response;

pub use {
  client::Engine,
  request::{Limits, RunSpec, VolumeMapping},
  response::{RunOutcome, SandboxError},
};
