use kube::CustomResourceExt;
use seldon_ingress_operator::crd::SeldonDeployment;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&SeldonDeployment::crd())?);
    Ok(())
}
