//! Built-in webapp topology
//!
//! Declares the demo multi-tier stack: a VPC with an internet gateway and
//! public routing, four subnets, a NAT path for the private tier, a
//! security group and key pair, a bastion instance, and an autoscaled
//! compute tier behind an application load balancer. Every cross-resource
//! value is an attribute reference, so the engine derives the creation
//! order instead of the declaration encoding it.

use netweave_core::{ResourceGraph, ResourceNode, Result};
use serde_json::json;

const VPC_CIDR: &str = "10.20.0.0/16";

/// Builds and finalizes the webapp resource graph
pub fn webapp_topology() -> Result<ResourceGraph> {
    let mut graph = ResourceGraph::new();

    graph.add_node(ResourceNode::new("the-vpc", "network").with_literal("cidr", VPC_CIDR))?;

    graph.add_node(ResourceNode::new("igw", "internet-gateway"))?;
    graph.add_node(
        ResourceNode::new("igw-attachment", "gateway-attachment")
            .with_reference("vpc_id", "the-vpc", "ref")
            .with_reference("internet_gateway_id", "igw", "ref"),
    )?;

    graph.add_node(
        ResourceNode::new("public-route-table", "route-table")
            .with_reference("vpc_id", "the-vpc", "ref"),
    )?;
    graph.add_node(
        ResourceNode::new("default-route", "route")
            .with_reference("route_table_id", "public-route-table", "ref")
            .with_literal("destination_cidr", "0.0.0.0/0")
            .with_reference("gateway_id", "igw", "ref"),
    )?;

    // Public subnets spread across four zones
    let zones = ["us-east-1a", "us-east-1b", "us-east-1c", "us-east-1d"];
    for (index, zone) in zones.iter().enumerate() {
        graph.add_node(
            ResourceNode::new(format!("subnet-{}", index + 1), "subnet")
                .with_reference("vpc_id", "the-vpc", "ref")
                .with_literal("availability_zone", *zone)
                .with_literal("cidr", format!("10.20.{}.0/24", index + 1))
                .with_literal("map_public_ip_on_launch", true),
        )?;
    }

    // NAT path for the private tier
    graph.add_node(ResourceNode::new("nat-eip", "eip"))?;
    graph.add_node(
        ResourceNode::new("nat-gateway", "nat-gateway")
            .with_reference("subnet_id", "subnet-1", "ref")
            .with_reference("allocation_id", "nat-eip", "allocation_id"),
    )?;
    graph.add_node(
        ResourceNode::new("private-route-table", "route-table")
            .with_reference("vpc_id", "the-vpc", "ref"),
    )?;
    graph.add_node(
        ResourceNode::new("private-route", "route")
            .with_reference("route_table_id", "private-route-table", "ref")
            .with_literal("destination_cidr", "0.0.0.0/0")
            .with_reference("nat_gateway_id", "nat-gateway", "ref"),
    )?;

    graph.add_node(
        ResourceNode::new("web-sg", "security-group")
            .with_reference("vpc_id", "the-vpc", "ref")
            .with_literal("description", "Allow SSH and HTTP inbound traffic")
            .with_literal(
                "ingress",
                json!([
                    { "protocol": "tcp", "port": 22, "source": "0.0.0.0/0", "description": "Allow SSH" },
                    { "protocol": "tcp", "port": 80, "source": "0.0.0.0/0", "description": "Allow HTTP" },
                ]),
            ),
    )?;

    graph.add_node(
        ResourceNode::new("deploy-key", "keypair").with_literal("key_name", "webapp-deploy"),
    )?;
    graph.add_node(
        ResourceNode::new("bastion", "instance")
            .with_reference("subnet_id", "subnet-1", "ref")
            .with_literal("instance_type", "t2.micro")
            .with_literal("image", "amazon-linux")
            .with_reference("key_name", "deploy-key", "ref")
            .with_reference("security_group_id", "web-sg", "ref"),
    )?;

    // Compute tier behind the NAT path
    graph.add_node(
        ResourceNode::new("web-asg", "autoscaling-group")
            .with_literal("instance_type", "t2.micro")
            .with_literal("image", "amazon-linux")
            .with_literal("min_capacity", 2)
            .with_literal("max_capacity", 4)
            .with_reference("subnet_a", "subnet-3", "ref")
            .with_reference("subnet_b", "subnet-4", "ref")
            .with_reference("security_group_id", "web-sg", "ref"),
    )?;

    graph.add_node(
        ResourceNode::new("web-alb", "loadbalancer")
            .with_reference("vpc_id", "the-vpc", "ref")
            .with_literal("internet_facing", true)
            .with_reference("subnet_a", "subnet-1", "ref")
            .with_reference("subnet_b", "subnet-2", "ref"),
    )?;
    // Target registration is just another dependency edge
    graph.add_node(
        ResourceNode::new("web-tg", "target-group")
            .with_reference("vpc_id", "the-vpc", "ref")
            .with_literal("port", 80)
            .with_reference("target", "web-asg", "ref"),
    )?;
    graph.add_node(
        ResourceNode::new("web-listener", "listener")
            .with_reference("loadbalancer_id", "web-alb", "ref")
            .with_literal("port", 80)
            .with_reference("target_group_id", "web-tg", "ref")
            .with_literal("default_action", "fixed-response:200:Hello from the ALB!"),
    )?;

    graph.finalize()?;
    Ok(graph)
}
