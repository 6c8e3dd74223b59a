//! Generated Terraform plugin protocol (tfplugin6) bindings

pub mod tfplugin6 {
    #![allow(clippy::all)]
    include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));
}
