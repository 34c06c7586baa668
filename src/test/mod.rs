#[cfg(test)]
mod adapter;

#[cfg(test)]
mod client;

#[cfg(test)]
mod evaluate;


#[cfg(test)]
mod report;

#[cfg(test)]
mod result;


#[cfg(test)]
mod workspace;

#[cfg(test)]
fn init() {
  let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    .is_test(true)
    .try_init();
}
