mod network_sim;
