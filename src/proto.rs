#[allow(clippy::enum_variant_names)]
pub mod prober {
    tonic::include_proto!("prober.v1");
}
