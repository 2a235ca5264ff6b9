#[cfg(test)]
mod app;
#[cfg(test)]
mod config;
#[cfg(test)]
mod routes;
