mod combine;
mod monitor;
