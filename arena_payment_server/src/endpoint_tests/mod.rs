mod helpers;
mod orders;
mod support;
mod webhook;
