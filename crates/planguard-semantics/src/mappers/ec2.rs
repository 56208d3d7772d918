//! Mapper for `aws_instance`, the richest per-resource fan-out: compute
//! hours, one storage component per attached volume, and the optional
//! EBS-optimization and detailed-monitoring surcharges.

use std::collections::BTreeMap;

use planguard_graph::GraphNode;
use planguard_types::{
    AttrPath, BillingComponent, BillingPeriod, ComponentKind, MappingError, UsageMode,
    VarianceProfile,
};
use serde_json::Value;

use super::IdAllocator;
use crate::registry::ResourceMapper;

pub struct Ec2InstanceMapper;

impl ResourceMapper for Ec2InstanceMapper {
    fn resource_type(&self) -> &'static str {
        "aws_instance"
    }

    fn supported_attributes(&self) -> &'static [&'static str] {
        &[
            "instance_type",
            "ami",
            "platform",
            "tenancy",
            "instance_lifecycle",
            "ebs_optimized",
            "monitoring",
            "root_block_device",
            "ebs_block_device",
        ]
    }

    fn produce_components(
        &self,
        node: &GraphNode,
    ) -> (Vec<BillingComponent>, Vec<MappingError>) {
        let attrs = AttrPath::new(&node.resource.attributes);
        let address = &node.resource.address;
        let mut ids = IdAllocator::new(address);
        let mut components = Vec::new();
        let mut errors = Vec::new();

        // instance_type is price-determining: no guessing.
        let instance_type = match attrs.non_empty_string("instance_type") {
            Ok(t) => t,
            Err(_) => {
                let error = MappingError::missing_attribute(
                    address,
                    &node.resource.resource_type,
                    "instance_type",
                );
                errors.push(error.clone());
                let mut component = compute_skeleton(node, ids.next(ComponentKind::Compute));
                component.mapping_error = Some(error);
                return (vec![component], errors);
            }
        };

        let mut variance = VarianceProfile::full_month();
        let operating_system = infer_operating_system(&attrs, &mut variance);
        let tenancy = normalize_tenancy(&attrs, &mut variance);
        let usage_mode = match attrs.string_or("instance_lifecycle", "").as_str() {
            "spot" => UsageMode::Spot,
            _ => UsageMode::OnDemand,
        };

        let mut lookup = BTreeMap::new();
        lookup.insert("instanceType".to_string(), instance_type.clone());
        lookup.insert("operatingSystem".to_string(), operating_system.clone());
        lookup.insert("tenancy".to_string(), tenancy);
        lookup.insert("preInstalledSw".to_string(), "NA".to_string());
        lookup.insert("capacityStatus".to_string(), "Used".to_string());

        components.push(BillingComponent {
            id: ids.next(ComponentKind::Compute),
            resource_address: address.clone(),
            kind: ComponentKind::Compute,
            usage_mode,
            billing_period: BillingPeriod::Hourly,
            service: "AmazonEC2".to_string(),
            product_family: "Compute Instance".to_string(),
            provider: node.resource.provider.clone(),
            region: node.resource.region.clone(),
            lookup_attributes: lookup,
            size_gb: None,
            description: format!("EC2 {instance_type} ({operating_system}) compute hours"),
            variance,
            depends_on: Vec::new(),
            mapping_error: None,
        });

        // Root volume: absent block means the provider default applies.
        let root_device = attrs.get("root_block_device.0").ok().cloned();
        components.push(volume_component(
            node,
            ids.next(ComponentKind::Storage),
            root_device.as_ref(),
            true,
        ));

        if let Ok(devices) = attrs.sequence("ebs_block_device") {
            for device in devices {
                components.push(volume_component(
                    node,
                    ids.next(ComponentKind::Storage),
                    Some(device),
                    false,
                ));
            }
        }

        if attrs.boolean_or("ebs_optimized", false) {
            let mut lookup = BTreeMap::new();
            lookup.insert("instanceType".to_string(), instance_type.clone());
            components.push(BillingComponent {
                id: ids.next(ComponentKind::Compute),
                resource_address: address.clone(),
                kind: ComponentKind::Compute,
                usage_mode: UsageMode::OnDemand,
                billing_period: BillingPeriod::Hourly,
                service: "AmazonEC2".to_string(),
                product_family: "EBS Optimized".to_string(),
                provider: node.resource.provider.clone(),
                region: node.resource.region.clone(),
                lookup_attributes: lookup,
                size_gb: None,
                description: format!("EBS-optimized usage for {instance_type}"),
                variance: VarianceProfile::full_month(),
                depends_on: Vec::new(),
                mapping_error: None,
            });
        }

        if attrs.boolean_or("monitoring", false) {
            // 7 detailed metrics per instance, billed per metric-month.
            components.push(BillingComponent {
                id: ids.next(ComponentKind::Data),
                resource_address: address.clone(),
                kind: ComponentKind::Data,
                usage_mode: UsageMode::Provisioned,
                billing_period: BillingPeriod::Monthly,
                service: "AmazonCloudWatch".to_string(),
                product_family: "Metric".to_string(),
                provider: node.resource.provider.clone(),
                region: node.resource.region.clone(),
                lookup_attributes: BTreeMap::new(),
                size_gb: None,
                description: "EC2 detailed monitoring (7 metrics)".to_string(),
                variance: VarianceProfile::provisioned(7.0),
                depends_on: Vec::new(),
                mapping_error: None,
            });
        }

        (components, errors)
    }
}

fn compute_skeleton(node: &GraphNode, id: String) -> BillingComponent {
    BillingComponent {
        id,
        resource_address: node.resource.address.clone(),
        kind: ComponentKind::Compute,
        usage_mode: UsageMode::OnDemand,
        billing_period: BillingPeriod::Hourly,
        service: "AmazonEC2".to_string(),
        product_family: "Compute Instance".to_string(),
        provider: node.resource.provider.clone(),
        region: node.resource.region.clone(),
        lookup_attributes: BTreeMap::new(),
        size_gb: None,
        description: "EC2 compute hours".to_string(),
        variance: VarianceProfile::default(),
        depends_on: Vec::new(),
        mapping_error: None,
    }
}

/// Build a storage component for a root or attached volume. An absent
/// device block falls back to the vendor's documented defaults (gp3, 8 GB),
/// recorded as assumptions.
fn volume_component(
    node: &GraphNode,
    id: String,
    device: Option<&Value>,
    is_root: bool,
) -> BillingComponent {
    let (volume_type, volume_size, defaulted) = match device {
        Some(device) => {
            let path = AttrPath::new(device);
            let volume_type = path.string_or("volume_type", "gp3");
            let volume_size = path.number_or("volume_size", 8.0);
            (volume_type, volume_size, false)
        }
        None => ("gp3".to_string(), 8.0, true),
    };

    let mut variance = VarianceProfile::provisioned(volume_size);
    if defaulted {
        variance = variance.with_assumption("provider default root volume (gp3, 8 GB)");
    }

    let mut lookup = BTreeMap::new();
    lookup.insert("volumeType".to_string(), volume_type.clone());
    if let Some(device) = device {
        let path = AttrPath::new(device);
        if let Ok(iops) = path.number("iops") {
            lookup.insert("iops".to_string(), format!("{iops}"));
        }
        if let Ok(throughput) = path.number("throughput") {
            lookup.insert("throughput".to_string(), format!("{throughput}"));
        }
    }

    let label = if is_root { "root" } else { "attached" };
    BillingComponent {
        id,
        resource_address: node.resource.address.clone(),
        kind: ComponentKind::Storage,
        usage_mode: UsageMode::Provisioned,
        billing_period: BillingPeriod::Monthly,
        service: "AmazonEC2".to_string(),
        product_family: "Storage".to_string(),
        provider: node.resource.provider.clone(),
        region: node.resource.region.clone(),
        lookup_attributes: lookup,
        size_gb: Some(volume_size),
        description: format!("EBS {volume_type} {label} volume ({volume_size:.0} GB)"),
        variance,
        depends_on: Vec::new(),
        mapping_error: None,
    }
}

/// OS is inferred from the platform attribute or AMI naming; the default
/// is Linux. Inference is recorded as an assumption, never guessed silently.
fn infer_operating_system(attrs: &AttrPath<'_>, variance: &mut VarianceProfile) -> String {
    if let Ok(platform) = attrs.string("platform") {
        if platform.eq_ignore_ascii_case("windows") {
            return "Windows".to_string();
        }
    }

    let ami = attrs.string_or("ami", "").to_lowercase();
    let os = if ami.contains("windows") {
        "Windows"
    } else if ami.contains("rhel") {
        "RHEL"
    } else if ami.contains("suse") {
        "SUSE"
    } else {
        "Linux"
    };
    variance
        .assumptions
        .push(format!("operating system inferred as {os} from image naming"));
    os.to_string()
}

fn normalize_tenancy(attrs: &AttrPath<'_>, variance: &mut VarianceProfile) -> String {
    match attrs.string("tenancy") {
        Ok(tenancy) => match tenancy.to_lowercase().as_str() {
            "dedicated" => "Dedicated".to_string(),
            "host" => "Host".to_string(),
            _ => "Shared".to_string(),
        },
        Err(_) => {
            variance
                .assumptions
                .push("shared tenancy assumed".to_string());
            "Shared".to_string()
        }
    }
}
