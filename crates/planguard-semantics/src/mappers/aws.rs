//! AWS resource mappers beyond EC2 instances.

use std::collections::BTreeMap;

use planguard_graph::GraphNode;
use planguard_types::{
    AttrPath, BillingComponent, BillingPeriod, ComponentKind, MappingError, UsageMode,
    VarianceProfile,
};

use super::ec2::Ec2InstanceMapper;
use super::IdAllocator;
use crate::registry::{MapperRegistry, ResourceMapper};

/// Register the built-in AWS mapper set.
pub fn register_aws_mappers(registry: &mut MapperRegistry) {
    registry.register(Box::new(Ec2InstanceMapper));
    registry.register(Box::new(EbsVolumeMapper));
    registry.register(Box::new(DbInstanceMapper));
    registry.register(Box::new(LambdaFunctionMapper));
    registry.register(Box::new(S3BucketMapper));
    registry.register(Box::new(DynamoDbTableMapper));
    registry.register(Box::new(NatGatewayMapper));
    registry.register(Box::new(LoadBalancerMapper));
    registry.register(Box::new(ElasticIpMapper));
    registry.register_alias("aws_alb", "aws_lb");
}

fn base_component(
    node: &GraphNode,
    id: String,
    kind: ComponentKind,
    usage_mode: UsageMode,
    billing_period: BillingPeriod,
    service: &str,
    product_family: &str,
    description: String,
    variance: VarianceProfile,
) -> BillingComponent {
    BillingComponent {
        id,
        resource_address: node.resource.address.clone(),
        kind,
        usage_mode,
        billing_period,
        service: service.to_string(),
        product_family: product_family.to_string(),
        provider: node.resource.provider.clone(),
        region: node.resource.region.clone(),
        lookup_attributes: BTreeMap::new(),
        size_gb: None,
        description,
        variance,
        depends_on: Vec::new(),
        mapping_error: None,
    }
}

// ---------------------------------------------------------------------------
// aws_ebs_volume
// ---------------------------------------------------------------------------

pub struct EbsVolumeMapper;

impl ResourceMapper for EbsVolumeMapper {
    fn resource_type(&self) -> &'static str {
        "aws_ebs_volume"
    }

    fn supported_attributes(&self) -> &'static [&'static str] {
        &["type", "size", "iops", "throughput"]
    }

    fn produce_components(
        &self,
        node: &GraphNode,
    ) -> (Vec<BillingComponent>, Vec<MappingError>) {
        let attrs = AttrPath::new(&node.resource.attributes);
        let mut ids = IdAllocator::new(&node.resource.address);
        let id = ids.next(ComponentKind::Storage);

        // Volume type and size both determine the price.
        let mut missing: Option<&str> = None;
        let volume_type = attrs.non_empty_string("type").unwrap_or_else(|_| {
            missing = Some("type");
            String::new()
        });
        let size = attrs.number("size").unwrap_or_else(|_| {
            missing.get_or_insert("size");
            0.0
        });

        if let Some(attribute) = missing {
            let error = MappingError::missing_attribute(
                &node.resource.address,
                &node.resource.resource_type,
                attribute,
            );
            let mut component = base_component(
                node,
                id,
                ComponentKind::Storage,
                UsageMode::Provisioned,
                BillingPeriod::Monthly,
                "AmazonEC2",
                "Storage",
                "EBS volume".to_string(),
                VarianceProfile::default(),
            );
            component.mapping_error = Some(error.clone());
            return (vec![component], vec![error]);
        }

        let mut component = base_component(
            node,
            id,
            ComponentKind::Storage,
            UsageMode::Provisioned,
            BillingPeriod::Monthly,
            "AmazonEC2",
            "Storage",
            format!("EBS {volume_type} volume ({size:.0} GB)"),
            VarianceProfile::provisioned(size),
        );
        component
            .lookup_attributes
            .insert("volumeType".to_string(), volume_type.clone());
        if matches!(volume_type.as_str(), "io1" | "io2" | "gp3") {
            if let Ok(iops) = attrs.number("iops") {
                component
                    .lookup_attributes
                    .insert("iops".to_string(), format!("{iops}"));
            }
        }
        if volume_type == "gp3" {
            if let Ok(throughput) = attrs.number("throughput") {
                component
                    .lookup_attributes
                    .insert("throughput".to_string(), format!("{throughput}"));
            }
        }
        component.size_gb = Some(size);
        (vec![component], vec![])
    }
}

// ---------------------------------------------------------------------------
// aws_db_instance
// ---------------------------------------------------------------------------

pub struct DbInstanceMapper;

impl ResourceMapper for DbInstanceMapper {
    fn resource_type(&self) -> &'static str {
        "aws_db_instance"
    }

    fn supported_attributes(&self) -> &'static [&'static str] {
        &["instance_class", "engine", "allocated_storage", "multi_az", "storage_type"]
    }

    fn produce_components(
        &self,
        node: &GraphNode,
    ) -> (Vec<BillingComponent>, Vec<MappingError>) {
        let attrs = AttrPath::new(&node.resource.attributes);
        let mut ids = IdAllocator::new(&node.resource.address);
        let mut errors = Vec::new();

        let instance_class = attrs.non_empty_string("instance_class");
        let engine = attrs.non_empty_string("engine");

        let (instance_class, engine) = match (instance_class, engine) {
            (Ok(class), Ok(engine)) => (class, engine),
            (class, _) => {
                let attribute = if class.is_err() { "instance_class" } else { "engine" };
                let error = MappingError::missing_attribute(
                    &node.resource.address,
                    &node.resource.resource_type,
                    attribute,
                );
                errors.push(error.clone());
                let mut component = base_component(
                    node,
                    ids.next(ComponentKind::Compute),
                    ComponentKind::Compute,
                    UsageMode::OnDemand,
                    BillingPeriod::Hourly,
                    "AmazonRDS",
                    "Database Instance",
                    "RDS instance hours".to_string(),
                    VarianceProfile::default(),
                );
                component.mapping_error = Some(error);
                return (vec![component], errors);
            }
        };

        let storage = attrs.number_or("allocated_storage", 20.0);
        let multi_az = attrs.boolean_or("multi_az", false);
        let storage_type = attrs.string_or("storage_type", "gp3");
        let deployment = if multi_az { "Multi-AZ" } else { "Single-AZ" };

        let mut compute = base_component(
            node,
            ids.next(ComponentKind::Compute),
            ComponentKind::Compute,
            UsageMode::OnDemand,
            BillingPeriod::Hourly,
            "AmazonRDS",
            "Database Instance",
            format!("RDS {instance_class} ({engine}, {deployment})"),
            VarianceProfile::full_month(),
        );
        compute
            .lookup_attributes
            .insert("instanceType".to_string(), instance_class);
        compute
            .lookup_attributes
            .insert("databaseEngine".to_string(), engine);
        compute
            .lookup_attributes
            .insert("deploymentOption".to_string(), deployment.to_string());

        let mut storage_component = base_component(
            node,
            ids.next(ComponentKind::Storage),
            ComponentKind::Storage,
            UsageMode::Provisioned,
            BillingPeriod::Monthly,
            "AmazonRDS",
            "Database Storage",
            format!("RDS storage ({storage:.0} GB)"),
            VarianceProfile::provisioned(storage)
                .with_assumption("allocated storage billed as provisioned"),
        );
        storage_component
            .lookup_attributes
            .insert("volumeType".to_string(), storage_type);
        storage_component
            .lookup_attributes
            .insert("deploymentOption".to_string(), deployment.to_string());
        storage_component.size_gb = Some(storage);
        storage_component.depends_on.push(compute.id.clone());

        (vec![compute, storage_component], errors)
    }
}

// ---------------------------------------------------------------------------
// aws_lambda_function
// ---------------------------------------------------------------------------

pub struct LambdaFunctionMapper;

impl ResourceMapper for LambdaFunctionMapper {
    fn resource_type(&self) -> &'static str {
        "aws_lambda_function"
    }

    fn supported_attributes(&self) -> &'static [&'static str] {
        &["memory_size", "timeout", "architectures"]
    }

    fn produce_components(
        &self,
        node: &GraphNode,
    ) -> (Vec<BillingComponent>, Vec<MappingError>) {
        let attrs = AttrPath::new(&node.resource.attributes);
        let mut ids = IdAllocator::new(&node.resource.address);
        // 128 MB is the provider default when memory_size is omitted.
        let memory = attrs.number_or("memory_size", 128.0);

        let mut component = base_component(
            node,
            ids.next(ComponentKind::Data),
            ComponentKind::Data,
            UsageMode::OnDemand,
            BillingPeriod::PerRequest,
            "AWSLambda",
            "Serverless",
            format!("Lambda function ({memory:.0} MB)"),
            VarianceProfile::usage_driven(1_000_000.0, 0.5)
                .with_assumption("invocation volume estimated from environment"),
        );
        component
            .lookup_attributes
            .insert("memorySize".to_string(), format!("{memory:.0}"));
        (vec![component], vec![])
    }
}

// ---------------------------------------------------------------------------
// aws_s3_bucket
// ---------------------------------------------------------------------------

pub struct S3BucketMapper;

impl ResourceMapper for S3BucketMapper {
    fn resource_type(&self) -> &'static str {
        "aws_s3_bucket"
    }

    fn supported_attributes(&self) -> &'static [&'static str] {
        &[]
    }

    fn produce_components(
        &self,
        node: &GraphNode,
    ) -> (Vec<BillingComponent>, Vec<MappingError>) {
        let mut ids = IdAllocator::new(&node.resource.address);

        let mut storage = base_component(
            node,
            ids.next(ComponentKind::Storage),
            ComponentKind::Storage,
            UsageMode::OnDemand,
            BillingPeriod::Monthly,
            "AmazonS3",
            "Storage",
            "S3 Standard storage".to_string(),
            VarianceProfile {
                baseline: 100.0,
                p50: 50.0,
                p90: 500.0,
                min: 0.0,
                max: 1000.0,
                confidence: 0.4,
                assumptions: vec!["object storage growth estimated from environment".to_string()],
            },
        );
        storage
            .lookup_attributes
            .insert("storageClass".to_string(), "STANDARD".to_string());
        storage.size_gb = Some(100.0);

        let mut requests = base_component(
            node,
            ids.next(ComponentKind::Data),
            ComponentKind::Data,
            UsageMode::OnDemand,
            BillingPeriod::PerRequest,
            "AmazonS3",
            "API Request",
            "S3 requests".to_string(),
            VarianceProfile::usage_driven(100_000.0, 0.4),
        );
        requests.depends_on.push(storage.id.clone());

        (vec![storage, requests], vec![])
    }
}

// ---------------------------------------------------------------------------
// aws_dynamodb_table
// ---------------------------------------------------------------------------

pub struct DynamoDbTableMapper;

impl ResourceMapper for DynamoDbTableMapper {
    fn resource_type(&self) -> &'static str {
        "aws_dynamodb_table"
    }

    fn supported_attributes(&self) -> &'static [&'static str] {
        &["billing_mode", "read_capacity", "write_capacity"]
    }

    fn produce_components(
        &self,
        node: &GraphNode,
    ) -> (Vec<BillingComponent>, Vec<MappingError>) {
        let attrs = AttrPath::new(&node.resource.attributes);
        let mut ids = IdAllocator::new(&node.resource.address);
        // PROVISIONED is the provider default billing mode.
        let billing_mode = attrs.string_or("billing_mode", "PROVISIONED");

        if billing_mode == "PAY_PER_REQUEST" {
            let mut component = base_component(
                node,
                ids.next(ComponentKind::Data),
                ComponentKind::Data,
                UsageMode::OnDemand,
                BillingPeriod::PerRequest,
                "AmazonDynamoDB",
                "Database",
                "DynamoDB on-demand capacity".to_string(),
                VarianceProfile::usage_driven(1_000_000.0, 0.5),
            );
            component
                .lookup_attributes
                .insert("billingMode".to_string(), "on-demand".to_string());
            return (vec![component], vec![]);
        }

        let rcu = attrs.number_or("read_capacity", 5.0);
        let wcu = attrs.number_or("write_capacity", 5.0);

        let mut read = base_component(
            node,
            ids.next(ComponentKind::Compute),
            ComponentKind::Compute,
            UsageMode::Provisioned,
            BillingPeriod::Hourly,
            "AmazonDynamoDB",
            "Provisioned IOPS",
            format!("DynamoDB {rcu:.0} read capacity units"),
            VarianceProfile::provisioned(rcu * planguard_types::units::HOURS_PER_MONTH),
        );
        read.lookup_attributes
            .insert("capacityUnit".to_string(), "ReadCapacityUnit-Hrs".to_string());

        let mut write = base_component(
            node,
            ids.next(ComponentKind::Compute),
            ComponentKind::Compute,
            UsageMode::Provisioned,
            BillingPeriod::Hourly,
            "AmazonDynamoDB",
            "Provisioned IOPS",
            format!("DynamoDB {wcu:.0} write capacity units"),
            VarianceProfile::provisioned(wcu * planguard_types::units::HOURS_PER_MONTH),
        );
        write
            .lookup_attributes
            .insert("capacityUnit".to_string(), "WriteCapacityUnit-Hrs".to_string());

        (vec![read, write], vec![])
    }
}

// ---------------------------------------------------------------------------
// aws_nat_gateway
// ---------------------------------------------------------------------------

pub struct NatGatewayMapper;

impl ResourceMapper for NatGatewayMapper {
    fn resource_type(&self) -> &'static str {
        "aws_nat_gateway"
    }

    fn supported_attributes(&self) -> &'static [&'static str] {
        &[]
    }

    fn produce_components(
        &self,
        node: &GraphNode,
    ) -> (Vec<BillingComponent>, Vec<MappingError>) {
        let mut ids = IdAllocator::new(&node.resource.address);

        let hours = base_component(
            node,
            ids.next(ComponentKind::Network),
            ComponentKind::Network,
            UsageMode::OnDemand,
            BillingPeriod::Hourly,
            "AmazonVPC",
            "NAT Gateway",
            "NAT Gateway hours".to_string(),
            VarianceProfile::full_month(),
        );

        let mut data = base_component(
            node,
            ids.next(ComponentKind::Network),
            ComponentKind::Network,
            UsageMode::OnDemand,
            BillingPeriod::PerGigabyte,
            "AmazonVPC",
            "NAT Gateway",
            "NAT Gateway data processing".to_string(),
            VarianceProfile::usage_driven(100.0, 0.5)
                .with_assumption("processed volume estimated from environment"),
        );
        data.depends_on.push(hours.id.clone());

        (vec![hours, data], vec![])
    }
}

// ---------------------------------------------------------------------------
// aws_lb
// ---------------------------------------------------------------------------

pub struct LoadBalancerMapper;

impl ResourceMapper for LoadBalancerMapper {
    fn resource_type(&self) -> &'static str {
        "aws_lb"
    }

    fn supported_attributes(&self) -> &'static [&'static str] {
        &["load_balancer_type"]
    }

    fn produce_components(
        &self,
        node: &GraphNode,
    ) -> (Vec<BillingComponent>, Vec<MappingError>) {
        let attrs = AttrPath::new(&node.resource.attributes);
        let mut ids = IdAllocator::new(&node.resource.address);
        // `application` is the provider default.
        let lb_type = attrs.string_or("load_balancer_type", "application");

        let product_family = match lb_type.as_str() {
            "network" => "Load Balancer-Network",
            "gateway" => "Load Balancer-Gateway",
            _ => "Load Balancer-Application",
        };

        let mut component = base_component(
            node,
            ids.next(ComponentKind::Network),
            ComponentKind::Network,
            UsageMode::OnDemand,
            BillingPeriod::Hourly,
            "ElasticLoadBalancing",
            product_family,
            format!("{lb_type} load balancer hours"),
            VarianceProfile::full_month(),
        );
        component
            .lookup_attributes
            .insert("loadBalancerType".to_string(), lb_type);
        (vec![component], vec![])
    }
}

// ---------------------------------------------------------------------------
// aws_eip
// ---------------------------------------------------------------------------

pub struct ElasticIpMapper;

impl ResourceMapper for ElasticIpMapper {
    fn resource_type(&self) -> &'static str {
        "aws_eip"
    }

    fn supported_attributes(&self) -> &'static [&'static str] {
        &["instance", "network_interface"]
    }

    fn produce_components(
        &self,
        node: &GraphNode,
    ) -> (Vec<BillingComponent>, Vec<MappingError>) {
        let attrs = AttrPath::new(&node.resource.attributes);

        // An EIP is free while attached; only idle addresses bill.
        let attached = !attrs.string_or("instance", "").is_empty()
            || !attrs.string_or("network_interface", "").is_empty();
        if attached {
            return (vec![], vec![]);
        }

        let mut ids = IdAllocator::new(&node.resource.address);
        let mut component = base_component(
            node,
            ids.next(ComponentKind::Network),
            ComponentKind::Network,
            UsageMode::OnDemand,
            BillingPeriod::Hourly,
            "AmazonEC2",
            "IP Address",
            "Idle Elastic IP address".to_string(),
            VarianceProfile::full_month(),
        );
        component
            .lookup_attributes
            .insert("addressState".to_string(), "idle".to_string());
        (vec![component], vec![])
    }
}
